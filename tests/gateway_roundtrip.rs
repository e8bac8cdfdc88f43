use chrono::{NaiveDate, NaiveDateTime};
use tempfile::tempdir;

use rollcall::{
    core::registrar::Registrar,
    persist::{Gateway, PersistError, memory::MemoryGateway, sqlite::SqliteGateway},
    student::{StudentDetails, StudentDraft, StudentFilter},
    types::{AttendanceStatus, Collection, Gender},
};

fn at(d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn draft(code: &str, document: &str) -> StudentDraft {
    StudentDraft {
        code: Some(code.to_string()),
        document_id: document.to_string(),
        details: StudentDetails {
            full_name: "Sofía Castro".to_string(),
            grade: "8-2".to_string(),
            gender: Gender::Female,
            address: "Avenida 5 #10-20".to_string(),
            phone: "601 555 0199".to_string(),
            email: Some("sofia@example.com".to_string()),
            photo_reference: None,
            birth_date: NaiveDate::from_ymd_opt(2011, 9, 2).unwrap(),
        },
    }
}

fn populated() -> Registrar {
    let mut r = Registrar::new();
    r.add_student(draft("123", "12345678"), at(1, 7)).unwrap();
    r.add_student(draft("124", "87654321"), at(1, 7)).unwrap();
    r.register_attendance("123", at(1, 8)).unwrap();
    r.register_attendance("124", at(1, 9)).unwrap();
    r.register_attendance("123", at(2, 8)).unwrap();
    r.drain_pending_ops();
    r
}

fn assert_same_state(a: &Registrar, b: &Registrar) {
    assert_eq!(
        a.list_students(&StudentFilter::all()),
        b.list_students(&StudentFilter::all())
    );
    assert_eq!(a.ledger().export(), b.ledger().export());
}

#[test]
fn sqlite_file_roundtrip_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("attendance.db");
    let original = populated();

    {
        let mut gateway = SqliteGateway::open(&path).expect("open");
        original.save_all(&mut gateway).expect("save");
        assert!(gateway.updated_ms(Collection::Ledger).expect("ts").is_some());
    }

    let gateway = SqliteGateway::open(&path).expect("reopen");
    let loaded = Registrar::load(&gateway).expect("load");
    assert_same_state(&original, &loaded);
    assert_eq!(loaded.ledger().next_id(), original.ledger().next_id());
}

#[test]
fn memory_gateway_clones_share_storage() {
    let original = populated();
    let inspector = MemoryGateway::new();
    let mut gateway = inspector.clone();
    original.save_all(&mut gateway).expect("save");

    let raw = inspector.raw(Collection::Roster).expect("raw").expect("stored");
    assert!(raw.contains("\"codigo\":\"123\""));
    assert!(raw.contains("\"genero\":\"F\""));

    let loaded = Registrar::load(&inspector).expect("load");
    assert_same_state(&original, &loaded);
}

#[test]
fn empty_store_loads_as_empty_registrar() {
    let sqlite = SqliteGateway::open_in_memory().expect("open");
    let r = Registrar::load(&sqlite).expect("load sqlite");
    assert!(r.directory().is_empty());
    assert!(r.ledger().is_empty());

    let memory = MemoryGateway::new();
    memory.insert_raw(Collection::Ledger, "  ").expect("seed");
    let r = Registrar::load(&memory).expect("load memory");
    assert!(r.ledger().is_empty());
    assert_eq!(r.ledger().next_id(), 1);
}

#[test]
fn legacy_payloads_decode_with_defaults() {
    let gateway = MemoryGateway::new();
    gateway
        .insert_raw(
            Collection::Roster,
            r#"[{
                "codigo": "45612",
                "documento": "1002003004",
                "nombre": "Andrés Mejía",
                "grado": "11-1",
                "genero": "M",
                "direccion": "Calle 1",
                "telefono": "3105550000",
                "email": "",
                "fechaNacimiento": "2007-02-10",
                "fechaRegistro": "2024-01-15T13:45:10.123Z",
                "studentPhoto": "blob:abc"
            }]"#,
        )
        .expect("seed roster");
    gateway
        .insert_raw(
            Collection::Ledger,
            r#"[{
                "id": 1714550400000,
                "studentCode": "45612",
                "studentName": "Andrés Mejía",
                "studentGrade": "11-1",
                "fecha": "2024-05-01",
                "hora": "07:55:00"
            }]"#,
        )
        .expect("seed ledger");

    let mut r = Registrar::load(&gateway).expect("load");
    let student = r.find_student("45612").expect("student").clone();
    assert!(student.active);
    assert_eq!(
        student.registered_at,
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_milli_opt(13, 45, 10, 123)
            .unwrap()
    );

    let records = r.list_for_student("45612");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AttendanceStatus::Present);
    assert_eq!(r.ledger().next_id(), 1_714_550_400_001);

    let again = r
        .register_attendance(
            "45612",
            NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        )
        .expect("register");
    assert!(!again.is_registered());
}

#[test]
fn duplicate_day_in_store_is_reported_as_corrupt() {
    let gateway = MemoryGateway::new();
    gateway
        .insert_raw(
            Collection::Ledger,
            r#"[
                {"id": 1, "studentCode": "123", "fecha": "2024-05-01", "hora": "08:00:00"},
                {"id": 2, "studentCode": "123", "fecha": "2024-05-01", "hora": "09:00:00"}
            ]"#,
        )
        .expect("seed");

    match Registrar::load(&gateway) {
        Err(PersistError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {other:?}"),
    }
}

#[test]
fn malformed_json_is_a_serde_error() {
    let gateway = MemoryGateway::new();
    gateway
        .insert_raw(Collection::Roster, "{not json")
        .expect("seed");
    assert!(matches!(gateway.load_roster(), Err(PersistError::Serde(_))));
}
