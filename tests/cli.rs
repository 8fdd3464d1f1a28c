mod common;

use std::fs;

use assert_cmd::Command;
use pim_tools::{
    data::Cell,
    loader::{self, LoadOptions},
    table::Table,
};
use predicates::{prelude::*, str::contains};

use common::{TestWorkspace, text_table};

fn pim_tools() -> Command {
    Command::cargo_bin("pim-tools").expect("binary exists")
}

const REVIEW: &str = "SELLER_NAME,CATEGORY,PRODUCT_SET_SID,PARENTSKU,reason\n\
Acme,Shoes,p1,SKU1,\n\
Acme,Shoes,p2,SKU2,bra\n\
Zed,Bags,p3,SKU3,col\n\
Acme,Shoes,p4,SKU4,\n";

#[test]
fn pivot_writes_summary_and_pim_file_into_stamped_folder() {
    let ws = TestWorkspace::new();
    let input = ws.write("review.csv", REVIEW);
    let out = ws.path().join("out");

    pim_tools()
        .args(["pivot", "-i", input.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .assert()
        .success();

    let folders = ws.files_with_prefix(&out, "PIM_output_");
    assert_eq!(folders.len(), 1);
    let folder = &folders[0];

    let pivots = ws.files_with_prefix(folder, "Pivot_Date_");
    assert_eq!(pivots.len(), 1);
    let bytes = fs::read(&pivots[0]).expect("read pivot");
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"), "pivot CSV carries a BOM");
    let text = String::from_utf8(bytes[3..].to_vec()).expect("utf-8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "Week_Number,Formatted_Date,SELLER_NAME,CATEGORY,app,rej,Blank_Column,new_col_1,new_col_2,reason"
    );
    assert_eq!(lines.len(), 4);
    assert!(lines[1].ends_with(",Acme,Shoes,2,,,KE,Charles,"));
    assert!(lines[2].ends_with(",Acme,Shoes,,1,,KE,Charles,Wrong Brand"));
    assert!(lines[3].ends_with(",Zed,Bags,,1,,KE,Charles,Wrong Color"));

    let pim_files = ws.files_with_prefix(folder, "PIM_Date_Time_");
    assert_eq!(pim_files.len(), 1);
    assert!(pim_files[0].extension().is_some_and(|e| e == "xlsx"));
    let pim = loader::load_table(&pim_files[0], &LoadOptions::default()).expect("load PIM");
    assert_eq!(
        pim.headers(),
        ["ProductSetSid", "ParentSKU", "Status", "Reason", "Comment"]
    );
    let statuses: Vec<String> = pim.column_values(2).map(Cell::as_display).collect();
    assert_eq!(statuses, vec!["Rejected", "Rejected", "Approved", "Approved"]);
    assert_eq!(pim.cell(0, 4), &Cell::text("Please use Fashion as brand name"));
}

#[test]
fn pivot_csv_format_and_manifest() {
    let ws = TestWorkspace::new();
    let input = ws.write("review.csv", REVIEW);
    let out = ws.path().join("out");

    pim_tools()
        .args([
            "pivot",
            "-i",
            input.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--pim-format",
            "csv",
            "--manifest",
        ])
        .assert()
        .success();

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("manifest.json")).expect("manifest"))
            .expect("json");
    let artifacts = manifest["artifacts"].as_array().expect("artifacts");
    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[0]["kind"], "pivot");
    assert_eq!(artifacts[0]["rows"], 3);
    assert_eq!(artifacts[1]["kind"], "pim");
    let pim_path = artifacts[1]["path"].as_str().expect("path");
    assert!(pim_path.ends_with(".csv"));
    assert!(fs::read_to_string(pim_path).expect("pim csv").starts_with("ProductSetSid,"));
}

#[test]
fn pivot_reports_missing_columns() {
    let ws = TestWorkspace::new();
    let input = ws.write("review.csv", "SELLER_NAME,CATEGORY\nAcme,Shoes\n");
    pim_tools()
        .current_dir(ws.path())
        .args(["pivot", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("error:"))
        .stderr(contains("'reason'"));
}

#[test]
fn merge_enriches_and_never_overwrites() {
    let ws = TestWorkspace::new();
    let first = ws.write(
        "export1.csv",
        "SellerName,SellerSku,PrimaryCategory,Name,Brand,Extra\nAcme,s1,1001,Boot,Generic,x\n",
    );
    let second = ws.write(
        "export2.csv",
        "SellerName;SellerSku;PrimaryCategory;Name;Brand\nZed;s2;2002;Hat;Zed\n",
    );
    let broken = ws.write("broken.csv", "Foo,Bar\n1,2\n");
    let sellers = ws.write_workbook(
        "sellers.xlsx",
        &[(
            "Sheet1",
            &Table::from_rows(
                vec!["SellerName".into(), "Seller_ID".into()],
                vec![vec![Cell::text("Acme"), Cell::Integer(10)]],
            ),
        )],
    );
    let tree = ws.write_workbook(
        "category_tree.xlsx",
        &[(
            "Sheet1",
            &Table::from_rows(
                vec!["PrimaryCategory".into(), "Category".into()],
                vec![vec![Cell::Integer(1001), Cell::text("Fashion/Shoes")]],
            ),
        )],
    );
    let out = ws.path().join("merged");

    for _ in 0..2 {
        pim_tools()
            .args([
                "merge",
                "-i",
                first.to_str().unwrap(),
                second.to_str().unwrap(),
                broken.to_str().unwrap(),
                "--sellers",
                sellers.to_str().unwrap(),
                "--category-tree",
                tree.to_str().unwrap(),
                "-o",
                out.to_str().unwrap(),
            ])
            .assert()
            .success();
    }

    let merged = ws.files_with_prefix(&out, "Merged_skus_");
    assert_eq!(merged.len(), 2);
    assert!(merged[1].to_str().unwrap().ends_with("_A.csv"));
    let text = fs::read_to_string(&merged[0]).expect("read merged");
    assert_eq!(
        text,
        "SellerName,Name,Seller_ID,SellerSku,PrimaryCategory,Brand\n\
         Acme,Boot,10,s1,Fashion/Shoes,Generic\n\
         Zed,Hat,,s2,2002,Zed\n"
    );
}

#[test]
fn merge_without_reference_files_still_writes_output() {
    let ws = TestWorkspace::new();
    let export = ws.write(
        "export.csv",
        "SellerName,SellerSku,PrimaryCategory,Name,Brand\nAcme,s1,1001,Boot,Generic\n",
    );
    pim_tools()
        .current_dir(ws.path())
        .args(["merge", "-i", export.to_str().unwrap()])
        .assert()
        .success();
    let merged = ws.files_with_prefix(ws.path(), "Merged_skus_");
    assert_eq!(merged.len(), 1);
    let text = fs::read_to_string(&merged[0]).expect("read merged");
    assert!(text.contains("Acme,Boot,,s1,1001,Generic"));
}

#[test]
fn split_writes_chunks_with_legend_and_zip() {
    let ws = TestWorkspace::new();
    let data = Table::from_rows(
        vec!["id".into()],
        (0..25).map(|i| vec![Cell::Integer(i)]).collect(),
    );
    let legend = text_table(&["Code", "Reason"], &[&["col", "Wrong Color"]]);
    let book = ws.write_workbook(
        "book.xlsx",
        &[("Sheet1", &data), ("RejectionReasons", &legend)],
    );
    let out = ws.path().join("chunks");

    pim_tools()
        .args([
            "split",
            "-i",
            book.to_str().unwrap(),
            "--chunk-size",
            "10",
            "--zip",
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    let chunks = ws.files_with_prefix(&out, "KE_PIM_");
    assert_eq!(chunks.len(), 3);
    let last = chunks
        .iter()
        .find(|p| p.to_str().unwrap().ends_with("_Sheet1_Set3.xlsx"))
        .expect("third chunk");
    let sheets = loader::load_workbook(last, &LoadOptions::default()).expect("reload chunk");
    assert_eq!(sheets.len(), 2);
    assert_eq!(sheets[0].1.row_count(), 5);
    assert_eq!(sheets[1].0, "RejectionReasons");
    assert_eq!(sheets[1].1.cell(0, 1), &Cell::text("Wrong Color"));
    assert!(out.join("output_files.zip").exists());
}

#[test]
fn split_rejects_zero_chunk_size() {
    let ws = TestWorkspace::new();
    let data = text_table(&["id"], &[&["1"]]);
    let book = ws.write_workbook("book.xlsx", &[("Sheet1", &data)]);
    pim_tools()
        .current_dir(ws.path())
        .args(["split", "-i", book.to_str().unwrap(), "--chunk-size", "0"])
        .assert()
        .failure()
        .stderr(contains("chunk size"));
}

#[test]
fn audit_adds_brand_and_colour_checks() {
    let ws = TestWorkspace::new();
    let listings = ws.write(
        "listings.csv",
        "BRAND,CATEGORY_CODE,COLOR\nGeneric,100,Navy\nGeneric,200,as shown\nAcme,100,\n",
    );
    let categories = ws.write("categories.csv", "CATEGORY_CODE\n100\n");
    let out = ws.path().join("audit");

    pim_tools()
        .args([
            "audit",
            "-i",
            listings.to_str().unwrap(),
            "--categories",
            categories.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    let files = ws.files_with_prefix(&out, "Output_PIM_");
    assert_eq!(files.len(), 1);
    let table = loader::load_table(&files[0], &LoadOptions::default()).expect("load audit");
    assert_eq!(
        table.headers(),
        ["BRAND", "CATEGORY_CODE", "COLOR", "check_Brand", "Check_Color"]
    );
    assert_eq!(
        table.display_rows(),
        vec![
            vec!["Generic", "100", "Navy", "No", "Yes"],
            vec!["Generic", "200", "as shown", "Yes", "No"],
            vec!["Acme", "100", "", "Yes", "No"],
        ]
    );
}

#[test]
fn audit_with_header_only_category_file_passes_every_brand() {
    let ws = TestWorkspace::new();
    let listings = ws.write(
        "listings.csv",
        "BRAND,CATEGORY_CODE,COLOR\nGeneric,100,Red\nAcme,200,Blue\n",
    );
    let categories = ws.write("categories.csv", "CATEGORY_CODE\n");
    let out = ws.path().join("audit");

    pim_tools()
        .args([
            "audit",
            "-i",
            listings.to_str().unwrap(),
            "--categories",
            categories.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stderr(contains("column not found in the category file").not());

    let files = ws.files_with_prefix(&out, "Output_PIM_");
    let table = loader::load_table(&files[0], &LoadOptions::default()).expect("load audit");
    assert_eq!(
        table.headers(),
        ["BRAND", "CATEGORY_CODE", "COLOR", "check_Brand", "Check_Color"]
    );
    let checks: Vec<String> = table.column_values(3).map(Cell::as_display).collect();
    assert_eq!(checks, vec!["Yes", "Yes"]);
}

#[test]
fn preview_prints_limited_rows() {
    let ws = TestWorkspace::new();
    let input = ws.write("review.csv", REVIEW);
    pim_tools()
        .current_dir(ws.path())
        .args(["preview", "-i", input.to_str().unwrap(), "--rows", "3"])
        .assert()
        .success()
        .stdout(contains("SELLER_NAME"))
        .stdout(contains("... 1 more row(s)"));
}

#[test]
fn preview_rejects_unknown_formats() {
    let ws = TestWorkspace::new();
    let input = ws.write("notes.pdf", "not a table");
    pim_tools()
        .current_dir(ws.path())
        .args(["preview", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Unsupported file format"));
}

#[test]
fn config_file_overrides_annotations() {
    let ws = TestWorkspace::new();
    let input = ws.write("review.csv", REVIEW);
    let config = ws.write(
        "pim.yml",
        "annotations:\n  - name: market\n    value: UG\n",
    );
    let out = ws.path().join("out");
    pim_tools()
        .args([
            "--config",
            config.to_str().unwrap(),
            "pivot",
            "-i",
            input.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();
    let folder = &ws.files_with_prefix(&out, "PIM_output_")[0];
    let pivot = &ws.files_with_prefix(folder, "Pivot_Date_")[0];
    let text = fs::read_to_string(pivot).expect("read pivot");
    assert!(text.contains("Blank_Column,market,reason"));
    assert!(text.contains(",UG,Wrong Brand"));
}
