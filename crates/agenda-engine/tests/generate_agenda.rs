use agenda_engine::{
    select_template, AgendaGenerator, GenerationError, GeneratorConfig, MemoryBlobStore, Meeting,
    RoleSlot, Stage, StoragePath, Strategy, TemplateRecord,
};
use agenda_model::{CellRef, CellValue};
use agenda_xlsx::minimal::MinimalWorkbook;
use agenda_xlsx::{TemplateWorkbook, XLSX_CONTENT_TYPE};
use chrono::{NaiveDate, NaiveTime};
use pretty_assertions::assert_eq;
use serde_json::json;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn text_at(workbook: &TemplateWorkbook, a1: &str) -> Option<String> {
    let at = CellRef::from_a1(a1).ok()?;
    workbook
        .grid()
        .value(at)
        .and_then(CellValue::as_text)
        .map(str::to_string)
}

fn meeting() -> Meeting {
    let mut meeting = Meeting::new(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(), "Taipei Toastmasters");
    meeting.meeting_number = Some(412);
    meeting.theme = Some("Spring".to_string());
    meeting.start_time = NaiveTime::from_hms_opt(19, 0, 0);
    meeting.role_slots = vec![
        RoleSlot::new("Timer").assigned("Alice"),
        RoleSlot::new("General Evaluator").assigned("Gina"),
        RoleSlot::indexed("Speaker", 1).assigned("Ann").speech("Ice Breaker", "Level 1"),
        RoleSlot::indexed("Speaker", 2).assigned("Ben").speech("Persuade", "Level 2"),
        RoleSlot::indexed("Speaker", 3).assigned("Cal").speech("Inform", "Level 3"),
        RoleSlot::indexed("Speaker", 4).assigned("Dee").speech("Inspire", "Level 4"),
    ];
    meeting
}

fn mapping_json(mappings: &[(&str, i64, i64)]) -> String {
    let entries: Vec<_> = mappings
        .iter()
        .map(|(role, row, col)| json!({"role": role, "value_position": {"row": row, "col": col}}))
        .collect();
    json!({ "variable_mappings": entries }).to_string()
}

#[test]
fn coordinate_fill_grows_the_speaker_block() -> TestResult {
    let template = MinimalWorkbook::new("Agenda")
        .text("A10", "Speaker")
        .blank("B10", 2)
        .text("A11", "Speaker")
        .blank("B11", 2)
        .row_height(11, 24.0)
        .text("A12", "General Evaluator")
        .text("A15", "Timer")
        .to_bytes()?;
    let structure = mapping_json(&[
        ("SPEAKER_1", 10, 2),
        ("SPEAKER_1_TITLE", 10, 3),
        ("SPEAKER_2", 11, 2),
        ("SPEAKER_2_TITLE", 11, 3),
        ("GE", 12, 2),
        ("TIMER", 15, 2),
    ]);

    let generator = AgendaGenerator::new(GeneratorConfig::default(), MemoryBlobStore::new());
    let agenda = generator.generate_from_bytes(&meeting(), &template, Some(&structure))?;

    assert_eq!(agenda.strategy, Strategy::Coordinates);
    assert_eq!(agenda.inserted_rows, 2);
    assert_eq!(agenda.content_type, XLSX_CONTENT_TYPE);
    assert_eq!(agenda.filename, "Agenda_Taipei_Toastmasters_2025-03-07.xlsx");

    let filled = TemplateWorkbook::from_bytes(&agenda.bytes)?;
    let cells: Vec<(&str, Option<String>)> = ["B10", "C10", "B11", "B12", "C12", "B13", "C13", "B14", "B17"]
        .into_iter()
        .map(|a1| (a1, text_at(&filled, a1)))
        .collect();
    let expected: Vec<(&str, Option<String>)> = [
        ("B10", "Ann"),
        ("C10", "Ice Breaker"),
        ("B11", "Ben"),
        ("B12", "Cal"),
        ("C12", "Inform"),
        ("B13", "Dee"),
        ("C13", "Inspire"),
        ("B14", "Gina"),
        ("B17", "Alice"),
    ]
    .into_iter()
    .map(|(a1, v)| (a1, Some(v.to_string())))
    .collect();
    assert_eq!(cells, expected);

    assert_eq!(text_at(&filled, "A14").as_deref(), Some("General Evaluator"));
    assert_eq!(text_at(&filled, "A17").as_deref(), Some("Timer"));
    let grid = filled.grid();
    for row in [12, 13] {
        let r = grid.row(row).ok_or("inserted row missing")?;
        assert_eq!(r.props.height, Some(24.0));
        assert_eq!(r.cells.get(&2).and_then(|c| c.style_id), Some(2));
    }
    Ok(())
}

#[test]
fn speaker_expansion_rewrites_formulas_below_the_block() -> TestResult {
    let template = MinimalWorkbook::new("Agenda")
        .text("A10", "Speaker")
        .text("A11", "Speaker")
        .text("A12", "General Evaluator")
        .shared_formula("D12", "LEN(A12)", "D12:D13", 0, 17.0)
        .shared_formula_dependent("D13", 0, 0.0)
        .text("A15", "Timer")
        .formula("D15", "ROWS(A10:A15)&\" rows\"", 6.0)
        .to_bytes()?;
    let structure = mapping_json(&[("SPEAKER_1", 10, 2), ("SPEAKER_2", 11, 2), ("TIMER", 15, 2)]);

    let generator = AgendaGenerator::new(GeneratorConfig::default(), MemoryBlobStore::new());
    let agenda = generator.generate_from_bytes(&meeting(), &template, Some(&structure))?;
    assert_eq!(agenda.inserted_rows, 2);

    let filled = TemplateWorkbook::from_bytes(&agenda.bytes)?;
    let formula = |a1: &str| {
        CellRef::from_a1(a1)
            .ok()
            .and_then(|at| filled.grid().cell(at))
            .and_then(|c| c.formula.clone())
    };
    let master = formula("D14").ok_or("shared master missing")?;
    assert_eq!(master.text, "LEN(A14)");
    assert_eq!(master.attr("ref"), Some("D14:D15"));
    assert_eq!(formula("D15").and_then(|f| f.attr("si").map(str::to_string)).as_deref(), Some("0"));
    assert_eq!(
        formula("D17").map(|f| f.text).as_deref(),
        Some("ROWS(A10:A17)&\" rows\"")
    );
    assert_eq!(text_at(&filled, "B17").as_deref(), Some("Alice"));
    Ok(())
}

#[test]
fn label_scan_fills_next_to_labels_and_placeholders() -> TestResult {
    let template = MinimalWorkbook::new("Agenda")
        .shared_strings()
        .text("A1", "{{CLUB_NAME}} Meeting {{MEETING_NUMBER}}{{NOT_A_KEY}}")
        .text("A5", "Timer")
        .blank("B5", 4)
        .text("A6", "General Evaluator")
        .text("B6", "already here")
        .text("A7", "Speaker 2")
        .to_bytes()?;

    let generator = AgendaGenerator::new(GeneratorConfig::default(), MemoryBlobStore::new());
    let agenda = generator.generate_from_bytes(&meeting(), &template, None)?;
    assert_eq!(agenda.strategy, Strategy::LabelScan);
    assert_eq!(agenda.inserted_rows, 0);

    let filled = TemplateWorkbook::from_bytes(&agenda.bytes)?;
    assert_eq!(
        text_at(&filled, "A1").as_deref(),
        Some("Taipei Toastmasters Meeting #412")
    );
    assert_eq!(text_at(&filled, "B5").as_deref(), Some("Alice"));
    assert_eq!(
        filled.grid().cell(CellRef::from_a1("B5")?).and_then(|c| c.style_id),
        Some(4)
    );
    assert_eq!(text_at(&filled, "B6").as_deref(), Some("already here"));
    assert_eq!(text_at(&filled, "B7").as_deref(), Some("Ben"));
    Ok(())
}

#[test]
fn inert_mappings_are_skipped_without_error() -> TestResult {
    let template = MinimalWorkbook::new("Agenda")
        .text("A5", "Timer")
        .text("A1", "untouched")
        .to_bytes()?;
    let structure = mapping_json(&[("GE", 0, 2), ("TIMER", 5, 2), ("THEME", 3, -1)]);

    let generator = AgendaGenerator::new(GeneratorConfig::default(), MemoryBlobStore::new());
    let agenda = generator.generate_from_bytes(&meeting(), &template, Some(&structure))?;

    assert_eq!(agenda.strategy, Strategy::Coordinates);
    assert_eq!((agenda.report.written, agenda.report.skipped), (1, 2));
    let filled = TemplateWorkbook::from_bytes(&agenda.bytes)?;
    assert_eq!(text_at(&filled, "B5").as_deref(), Some("Alice"));
    assert_eq!(text_at(&filled, "A1").as_deref(), Some("untouched"));
    assert_eq!(filled.grid().last_row(), Some(5));
    Ok(())
}

#[test]
fn malformed_structure_falls_back_to_label_scan() -> TestResult {
    let template = MinimalWorkbook::new("Agenda").text("A5", "Timer").to_bytes()?;

    let generator = AgendaGenerator::new(GeneratorConfig::default(), MemoryBlobStore::new());
    let agenda =
        generator.generate_from_bytes(&meeting(), &template, Some("{\"variable_mappings\": [oops"))?;

    assert_eq!(agenda.strategy, Strategy::LabelScan);
    let filled = TemplateWorkbook::from_bytes(&agenda.bytes)?;
    assert_eq!(text_at(&filled, "B5").as_deref(), Some("Alice"));
    Ok(())
}

#[test]
fn merged_targets_and_hidden_rows() -> TestResult {
    let template = MinimalWorkbook::new("Agenda")
        .merge("B3:D3")
        .hidden_row(8)
        .to_bytes()?;
    let structure = mapping_json(&[("THEME", 3, 3), ("TIMER", 8, 2)]);

    let generator = AgendaGenerator::new(GeneratorConfig::default(), MemoryBlobStore::new());
    let agenda = generator.generate_from_bytes(&meeting(), &template, Some(&structure))?;

    let filled = TemplateWorkbook::from_bytes(&agenda.bytes)?;
    assert_eq!(text_at(&filled, "B3").as_deref(), Some("Spring"));
    assert_eq!(text_at(&filled, "C3"), None);
    assert_eq!(text_at(&filled, "B8").as_deref(), Some("Alice"));
    assert!(!filled.grid().row(8).ok_or("row 8 missing")?.props.hidden);
    Ok(())
}

#[test]
fn generates_from_the_selected_stored_template() -> TestResult {
    let bytes = MinimalWorkbook::new("Agenda")
        .text("A2", "Timer")
        .to_bytes()?;
    let path: StoragePath = "gs://club-templates/7/agenda.xlsx".parse()?;
    let store = MemoryBlobStore::new().with_blob(path.clone(), bytes);
    let templates = vec![
        TemplateRecord {
            id: 1,
            club_id: 7,
            name: "retired".to_string(),
            storage_path: Some("gs://club-templates/7/old.xlsx".to_string()),
            parsed_structure: None,
            is_active: false,
        },
        TemplateRecord {
            id: 2,
            club_id: 7,
            name: "current".to_string(),
            storage_path: Some(path.to_string()),
            parsed_structure: Some(mapping_json(&[("TIMER", 2, 3)])),
            is_active: true,
        },
    ];
    let mut meeting = meeting();
    meeting.club_id = Some(7);

    let generator = AgendaGenerator::new(GeneratorConfig::default(), store);
    let agenda = generator.generate(&meeting, select_template(&templates, None, &meeting))?;

    let filled = TemplateWorkbook::from_bytes(&agenda.bytes)?;
    assert_eq!(text_at(&filled, "C2").as_deref(), Some("Alice"));
    assert_eq!(
        agenda.content_disposition(),
        "attachment; filename=\"Agenda_Taipei_Toastmasters_2025-03-07.xlsx\""
    );

    let err = generator
        .generate(&meeting, select_template(&templates, Some(1), &meeting))
        .unwrap_err();
    assert!(matches!(err, GenerationError::TemplateUnavailable));
    assert_eq!(err.stage(), Stage::NoTemplate);
    Ok(())
}

#[test]
fn preview_serializes_the_agenda_data() {
    let generator = AgendaGenerator::new(GeneratorConfig::default(), MemoryBlobStore::new());
    let preview = serde_json::to_value(generator.preview(&meeting())).unwrap();

    assert_eq!(preview["TIMER_NAME"], json!("Alice"));
    assert_eq!(preview["GE_NAME"], json!("Gina"));
    assert_eq!(preview["MEETING_NUMBER"], json!("#412"));
    assert_eq!(preview["START_TIME"], json!("19:00"));
    assert_eq!(preview["SPEAKER_3_NAME"], json!("Cal"));
    assert_eq!(
        preview["SPEAKERS"][1],
        json!({"name": "Ben", "title": "Persuade", "project": "Level 2"})
    );
}
