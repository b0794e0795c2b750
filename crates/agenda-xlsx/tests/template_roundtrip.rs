use agenda_model::{CellRef, CellValue, MergedRegion};
use agenda_xlsx::minimal::MinimalWorkbook;
use agenda_xlsx::{parse_relationships, TemplateWorkbook, XlsxPackage};
use pretty_assertions::assert_eq;
use rust_xlsxwriter::{Format, Workbook};

fn text_at(workbook: &TemplateWorkbook, a1: &str) -> Option<String> {
    let at = CellRef::from_a1(a1).ok()?;
    workbook
        .grid()
        .value(at)
        .and_then(CellValue::as_text)
        .map(str::to_string)
}

#[test]
fn fill_and_save_preserves_unrelated_parts() -> Result<(), Box<dyn std::error::Error>> {
    let bytes = MinimalWorkbook::new("Agenda")
        .shared_strings()
        .styled_text("A1", "Timer", 1)
        .blank("B1", 3)
        .text("A2", "Speaker 1")
        .formula("C2", "1+1", 2.0)
        .extra_sheet("Notes")
        .to_bytes()?;
    let original = XlsxPackage::from_bytes(&bytes)?;

    let mut workbook = TemplateWorkbook::from_bytes(&bytes)?;
    assert_eq!(workbook.sheet_name(), "Agenda");
    assert_eq!(workbook.sheet_part(), "xl/worksheets/sheet1.xml");
    assert_eq!(text_at(&workbook, "A1").as_deref(), Some("Timer"));

    let b1 = CellRef::from_a1("B1")?;
    workbook.grid_mut().set_text_preserving_style(b1, "Alice");
    let saved = workbook.to_bytes()?;

    let reopened = TemplateWorkbook::from_bytes(&saved)?;
    assert_eq!(text_at(&reopened, "A1").as_deref(), Some("Timer"));
    assert_eq!(text_at(&reopened, "B1").as_deref(), Some("Alice"));
    assert_eq!(reopened.grid().cell(b1).and_then(|c| c.style_id), Some(3));
    assert_eq!(
        reopened.grid().value(CellRef::from_a1("C2")?),
        Some(&CellValue::Number(2.0))
    );

    let package = reopened.package();
    for part in [
        "xl/styles.xml",
        "xl/sharedStrings.xml",
        "xl/worksheets/sheet2.xml",
        "xl/workbook.xml",
    ] {
        assert_eq!(package.part(part), original.part(part), "{part} changed");
    }

    assert!(package.part("xl/calcChain.xml").is_none());
    assert!(!package.part_str("[Content_Types].xml")?.contains("calcChain"));
    let rels = parse_relationships(
        package
            .part("xl/_rels/workbook.xml.rels")
            .ok_or("missing workbook rels")?,
    )?;
    assert!(rels.iter().all(|rel| !rel.type_uri.ends_with("/calcChain")));
    assert_eq!(rels.len(), 4);
    Ok(())
}

#[test]
fn row_insertion_survives_a_save() -> Result<(), Box<dyn std::error::Error>> {
    let bytes = MinimalWorkbook::new("Agenda")
        .styled_text("A3", "Speaker 2", 1)
        .row_height(3, 30.0)
        .text("A4", "Evaluator 1")
        .merge("B4:D5")
        .hidden_row(6)
        .text("A6", "spare")
        .to_bytes()?;

    let mut workbook = TemplateWorkbook::from_bytes(&bytes)?;
    let grid = workbook.grid_mut();
    grid.insert_rows(4, 2, 3)?;
    assert!(grid.unhide_row(8));

    let reopened = TemplateWorkbook::from_bytes(&workbook.to_bytes()?)?;
    let grid = reopened.grid();
    assert_eq!(text_at(&reopened, "A6").as_deref(), Some("Evaluator 1"));
    assert_eq!(text_at(&reopened, "A8").as_deref(), Some("spare"));
    assert!(!grid.row(8).map(|r| r.props.hidden).unwrap_or(true));
    for row in [4, 5] {
        let r = grid.row(row).ok_or("inserted row missing")?;
        assert_eq!(r.props.height, Some(30.0));
        assert_eq!(r.cells.get(&1).and_then(|c| c.style_id), Some(1));
        assert!(r.cells.values().all(|c| c.value.is_empty()));
    }
    assert_eq!(
        grid.merges().iter().copied().collect::<Vec<_>>(),
        vec![MergedRegion::new(6, 7, 2, 4)]
    );
    Ok(())
}

#[test]
fn formulas_below_inserted_rows_are_rewritten_on_save() -> Result<(), Box<dyn std::error::Error>> {
    let bytes = MinimalWorkbook::new("Agenda")
        .text("A11", "Speaker 2")
        .number("A12", 4.0)
        .number("A13", 5.0)
        .shared_formula("B12", "A12+1", "B12:B13", 0, 5.0)
        .shared_formula_dependent("B13", 0, 6.0)
        .formula("C14", "SUM(A11:A13)", 9.0)
        .to_bytes()?;

    let mut workbook = TemplateWorkbook::from_bytes(&bytes)?;
    workbook.grid_mut().insert_rows(12, 2, 11)?;
    let saved = workbook.to_bytes()?;

    let reopened = TemplateWorkbook::from_bytes(&saved)?;
    let formula = |a1: &str| {
        CellRef::from_a1(a1)
            .ok()
            .and_then(|at| reopened.grid().cell(at))
            .and_then(|c| c.formula.clone())
    };
    let master = formula("B14").ok_or("shared master missing")?;
    assert_eq!(master.text, "A14+1");
    assert_eq!(master.attr("t"), Some("shared"));
    assert_eq!(master.attr("ref"), Some("B14:B15"));
    let dependent = formula("B15").ok_or("shared dependent missing")?;
    assert_eq!(dependent.attr("si"), Some("0"));
    assert!(dependent.attr("ref").is_none());
    assert_eq!(formula("C16").map(|f| f.text).as_deref(), Some("SUM(A11:A15)"));
    assert!(formula("B12").is_none());

    let sheet = reopened.package().part_str(reopened.sheet_part())?;
    assert!(sheet.contains(r#"ref="B14:B15""#), "sheet xml:\n{sheet}");
    assert!(!sheet.contains("A12+1"), "sheet xml:\n{sheet}");
    Ok(())
}

#[test]
fn reads_templates_written_by_rust_xlsxwriter() -> Result<(), Box<dyn std::error::Error>> {
    let mut book = Workbook::new();
    let sheet = book.add_worksheet();
    sheet.set_name("Meeting Agenda")?;
    let bold = Format::new().set_bold();
    sheet.write_string_with_format(0, 0, "{{CLUB_NAME}}", &bold)?;
    sheet.merge_range(1, 0, 1, 2, "Toastmaster of the Evening", &bold)?;
    sheet.write_string(2, 0, "計時 Timer")?;
    sheet.write_number(2, 3, 7.0)?;
    sheet.set_row_height(2, 28.5)?;
    let bytes = book.save_to_buffer()?;

    let workbook = TemplateWorkbook::from_bytes(&bytes)?;
    assert_eq!(workbook.sheet_name(), "Meeting Agenda");
    assert_eq!(text_at(&workbook, "A1").as_deref(), Some("{{CLUB_NAME}}"));
    assert_eq!(text_at(&workbook, "A3").as_deref(), Some("計時 Timer"));
    assert_eq!(
        workbook.grid().anchor_of(CellRef::from_a1("C2")?),
        CellRef::from_a1("A2")?
    );
    assert_eq!(workbook.grid().row(3).and_then(|r| r.props.height), Some(28.5));
    assert_eq!(
        workbook.grid().value(CellRef::from_a1("D3")?),
        Some(&CellValue::Number(7.0))
    );
    Ok(())
}

#[test]
fn non_xlsx_bytes_are_rejected() {
    assert!(TemplateWorkbook::from_bytes(b"PK\x03\x04 truncated").is_err());
    assert!(TemplateWorkbook::from_bytes(b"plain text").is_err());
}
