use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::PreviewArgs,
    loader::{self, FileFormat},
    render,
    session::Session,
    workbook,
};

pub fn execute(args: &PreviewArgs, session: &mut Session) -> Result<()> {
    let options =
        session.load_options(args.sheet.clone(), args.delimiter, args.input_encoding.as_deref())?;
    if loader::detect_format(&args.input)? == FileFormat::Workbook {
        let sheets = workbook::sheet_names(&args.input)
            .with_context(|| format!("Listing sheets of {:?}", args.input))?;
        info!("Sheets in {:?}: {}", args.input, sheets.join(", "));
    }
    let table = loader::load_table(&args.input, &options)
        .with_context(|| format!("Loading {:?}", args.input))?;
    render::print_table(&table, args.rows);
    info!(
        "Displayed {} of {} row(s) from {:?}",
        args.rows.min(table.row_count()),
        table.row_count(),
        args.input
    );
    Ok(())
}
