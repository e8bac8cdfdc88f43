use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use rollcall::{
    attendance::AttendanceDraft,
    core::registrar::Registrar,
    report::{
        Dataset,
        export::{ATTENDANCE_HEADER, ROSTER_HEADER},
        summary::{ObservationWindow, top_grades, top_students},
    },
    student::{StudentDetails, StudentDraft},
    types::{AttendanceStatus, Gender},
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    day(d).and_hms_opt(h, m, 0).unwrap()
}

fn draft(code: &str, document: &str, name: &str, grade: &str, gender: Gender) -> StudentDraft {
    StudentDraft {
        code: Some(code.to_string()),
        document_id: document.to_string(),
        details: StudentDetails {
            full_name: name.to_string(),
            grade: grade.to_string(),
            gender,
            address: "Calle 9".to_string(),
            phone: "5550123".to_string(),
            email: None,
            photo_reference: None,
            birth_date: NaiveDate::from_ymd_opt(2009, 6, 1).unwrap(),
        },
    }
}

/// Three students enrolled on May 1, one more on May 9; inactive student 127.
fn dataset() -> Dataset {
    let mut r = Registrar::new();
    r.add_student(draft("123", "12345678", "Juan Pérez", "10-1", Gender::Male), at(1, 7, 0))
        .unwrap();
    r.add_student(draft("124", "87654321", "María López", "9-2", Gender::Female), at(1, 7, 0))
        .unwrap();
    r.add_student(draft("125", "11223344", "Carlos Ramírez", "10-1", Gender::Male), at(1, 7, 0))
        .unwrap();
    r.add_student(draft("126", "44332211", "Ana Gómez", "9-2", Gender::Female), at(9, 7, 0))
        .unwrap();
    r.add_student(draft("127", "55667788", "Luis Vargas", "11-1", Gender::Male), at(1, 7, 0))
        .unwrap();
    r.set_active("127", false).unwrap();

    for d in 1..=10 {
        r.register_attendance("123", at(d, 7, 50)).unwrap();
    }
    for d in 6..=10 {
        r.register_attendance("124", at(d, 8, 10)).unwrap();
    }
    r.register_attendance("126", at(10, 7, 45)).unwrap();
    r.register_attendance_with("125", at(10, 9, 30), AttendanceStatus::Absent, None).unwrap();
    Dataset::from_registrar(&r)
}

#[test]
fn daily_summary_counts_active_students_and_skips_absent_marks() {
    let data = dataset();
    let s = data.summary(day(10));
    assert_eq!(s.total_students, 4);
    assert_eq!(s.present, 3);
    assert_eq!(s.absent, 1);
    assert_eq!(s.rate_percent, 75);

    let empty = Dataset::default().summary(day(10));
    assert_eq!(empty.total_students, 0);
    assert_eq!(empty.rate_percent, 0);
}

#[test]
fn daily_counts_cover_trailing_days_oldest_first() {
    let counts = dataset().daily_counts(day(10), 7);
    assert_eq!(counts.len(), 7);
    assert_eq!(counts[0].date, day(4));
    assert_eq!(counts[6].date, day(10));
    assert_eq!(counts[0].count, 1);
    assert_eq!(counts[2].count, 2);
    assert_eq!(counts[6].count, 3);
}

#[test]
fn student_rates_clamp_to_enrollment_date() {
    let data = dataset();
    let rates = data.student_rates(ObservationWindow::new(day(10), 10));
    let rate = |code: &str| rates.iter().find(|r| r.code == code).unwrap().clone();

    assert_eq!(rate("123").rate_percent, 100);
    assert_eq!(rate("124").attended, 5);
    assert_eq!(rate("124").rate_percent, 50);
    assert_eq!(rate("125").attended, 0);
    assert_eq!(rate("126").observed_days, 2);
    assert_eq!(rate("126").rate_percent, 50);

    let top = top_students(rates, 2);
    assert_eq!(top[0].code, "123");
    assert_eq!(top[1].code, "124");
}

#[test]
fn grade_breakdown_is_sorted_and_ranked() {
    let data = dataset();
    let grades = data.grade_breakdown(ObservationWindow::new(day(10), 10));
    let labels: Vec<_> = grades.iter().map(|g| g.grade.as_str()).collect();
    assert_eq!(labels, vec!["10-1", "11-1", "9-2"]);

    let ten = &grades[0];
    assert_eq!(ten.students, 2);
    assert_eq!(ten.attended, 10);
    assert_eq!(ten.observed_days, 20);
    assert_eq!(ten.rate_percent, 50);

    let nine = &grades[2];
    assert_eq!(nine.attended, 6);
    assert_eq!(nine.observed_days, 12);

    let best = top_grades(grades, 1);
    assert_eq!(best[0].grade, "10-1");
}

#[test]
fn attendance_csv_lists_one_day_by_time() {
    let csv = dataset().attendance_csv(day(10)).expect("csv");
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], ATTENDANCE_HEADER.join(","));
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[1], "126,Ana Gómez,9-2,2024-05-10,07:45:00");
    assert_eq!(lines[2], "123,Juan Pérez,10-1,2024-05-10,07:50:00");
    assert!(lines[4].starts_with("125,"));
    assert!(!csv.contains('\r'));
}

#[test]
fn roster_csv_uses_labels_and_short_dates() {
    let csv = dataset().roster_csv().expect("csv");
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], ROSTER_HEADER.join(","));
    assert_eq!(lines.len(), 6);
    assert_eq!(
        lines[2],
        "124,María López,9-2,Femenino,87654321,5550123,,1/5/2024"
    );
    assert!(lines[4].contains(",Femenino,") && lines[4].ends_with(",9/5/2024"));
}

#[test]
fn report_json_uses_wire_keys() {
    let json = dataset().report_json(day(10)).expect("json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(value["fecha"], "2024-05-10");
    assert_eq!(value["totalEstudiantes"], 4);
    assert_eq!(value["asistenciaHoy"], 3);
    assert_eq!(value["tasaAsistencia"], 75);

    let students = value["estudiantes"].as_array().expect("array");
    assert_eq!(students.len(), 4);
    assert_eq!(students[0]["codigo"], "123");
    assert_eq!(students[0]["nombre"], "Juan Pérez");
    assert_eq!(students[0]["grado"], "10-1");
    assert_eq!(students[0]["asistencias"], 10);
    assert_eq!(students[2]["codigo"], "125");
    assert_eq!(students[2]["asistencias"], 0);
    assert!(students.iter().all(|s| s["codigo"] != "127"));
}

/// Imported records the registrar itself would refuse: one for the inactive
/// student and one dated before the student enrolled.
fn dataset_with_stray_records() -> Dataset {
    let mut data = dataset();
    let stray = |id: u64, code: &str, name: &str, grade: &str, d: u32| {
        AttendanceDraft {
            student_code: code.to_string(),
            student_name: name.to_string(),
            student_grade: grade.to_string(),
            calendar_date: day(d),
            time_of_day: NaiveTime::from_hms_opt(7, 55, 0).unwrap(),
            status: AttendanceStatus::Present,
            notes: None,
        }
        .into_record(id)
    };
    data.records.push(stray(900, "127", "Luis Vargas", "11-1", 10));
    data.records.push(stray(901, "126", "Ana Gómez", "9-2", 5));
    data
}

#[test]
fn inactive_students_do_not_inflate_the_daily_rate() {
    let data = dataset_with_stray_records();
    let s = data.summary(day(10));
    assert_eq!(s.total_students, 4);
    assert_eq!(s.present, 3);
    assert_eq!(s.rate_percent, 75);

    let json = data.report_json(day(10)).expect("json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(value["asistenciaHoy"], 3);
    assert_eq!(value["estudiantes"].as_array().expect("array").len(), 4);
}

#[test]
fn records_before_enrollment_are_not_attended_days() {
    let data = dataset_with_stray_records();
    let rates = data.student_rates(ObservationWindow::new(day(10), 10));
    let ana = rates.iter().find(|r| r.code == "126").unwrap();
    assert_eq!(ana.attended, 1);
    assert_eq!(ana.observed_days, 2);
    assert_eq!(ana.rate_percent, 50);
    assert!(rates.iter().all(|r| r.rate_percent <= 100));
}
