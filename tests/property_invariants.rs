use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use rollcall::{
    attendance::AttendanceRecord,
    core::registrar::Registrar,
    student::{Student, StudentDetails, StudentDraft, StudentFilter},
    types::{Gender, RecordId},
};

const STUDENTS: u8 = 6;

#[derive(Debug, Clone)]
enum Action {
    Register { student: u8, day: u8, minute: u16 },
    Remove { target: u8 },
    SetActive { student: u8, active: bool },
    AddStudent { student: u8 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (0u8..STUDENTS + 2, 0u8..5, 0u16..1440)
            .prop_map(|(student, day, minute)| Action::Register { student, day, minute }),
        1 => (0u8..32).prop_map(|target| Action::Remove { target }),
        1 => (0u8..STUDENTS, any::<bool>())
            .prop_map(|(student, active)| Action::SetActive { student, active }),
        1 => (0u8..STUDENTS).prop_map(|student| Action::AddStudent { student }),
    ]
}

fn code_for(student: u8) -> String {
    format!("{}", 100 + u32::from(student))
}

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn draft_for(student: u8) -> StudentDraft {
    StudentDraft {
        code: Some(code_for(student)),
        document_id: format!("{:08}", 20_000_000 + u32::from(student)),
        details: StudentDetails {
            full_name: "Laura Torres".to_string(),
            grade: format!("{}-1", 6 + student % 3),
            gender: if student % 2 == 0 { Gender::Female } else { Gender::Male },
            address: "Carrera 7".to_string(),
            phone: "3001234567".to_string(),
            email: None,
            photo_reference: None,
            birth_date: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
        },
    }
}

fn full_scan_for_date(r: &Registrar, date: NaiveDate) -> BTreeSet<RecordId> {
    r.ledger()
        .iter()
        .filter(|rec| rec.calendar_date == date)
        .map(|rec| rec.id)
        .collect()
}

fn full_scan_for_student(r: &Registrar, code: &str) -> BTreeSet<RecordId> {
    r.ledger()
        .iter()
        .filter(|rec| rec.student_code == code)
        .map(|rec| rec.id)
        .collect()
}

fn snapshot(r: &Registrar) -> (Vec<Student>, Vec<AttendanceRecord>) {
    (r.list_students(&StudentFilter::all()), r.ledger().export())
}

proptest! {
    #[test]
    fn random_sequences_keep_one_record_per_day_and_revert_cleanly(
        actions in prop::collection::vec(action_strategy(), 1..150)
    ) {
        let mut r = Registrar::new();
        for s in 0..STUDENTS / 2 {
            r.add_student(draft_for(s), base_time()).expect("seed");
        }
        r.drain_pending_ops();
        let baseline = snapshot(&r);

        let mut dates = BTreeSet::new();
        for action in actions {
            match action {
                Action::Register { student, day, minute } => {
                    let now = base_time()
                        + Duration::days(i64::from(day))
                        + Duration::minutes(i64::from(minute));
                    dates.insert(now.date());
                    let before = r.ledger().len();
                    let out = r.register_attendance(&code_for(student), now).expect("register");
                    let expected = before + usize::from(out.is_registered());
                    prop_assert_eq!(r.ledger().len(), expected);
                }
                Action::Remove { target } => {
                    let ids = r.ledger().ordered_ids().to_vec();
                    if ids.is_empty() {
                        continue;
                    }
                    let id = ids[usize::from(target) % ids.len()];
                    prop_assert!(r.remove_record(id).is_ok());
                }
                Action::SetActive { student, active } => {
                    let _ = r.set_active(&code_for(student), active);
                }
                Action::AddStudent { student } => {
                    let before = r.directory().len();
                    match r.add_student(draft_for(student), base_time()) {
                        Ok(_) => prop_assert_eq!(r.directory().len(), before + 1),
                        Err(_) => prop_assert_eq!(r.directory().len(), before),
                    }
                }
            }

            let mut seen = BTreeSet::new();
            for rec in r.ledger().iter() {
                prop_assert!(
                    seen.insert((rec.student_code.clone(), rec.calendar_date)),
                    "two records for {} on {}", rec.student_code, rec.calendar_date
                );
            }
            for date in &dates {
                let indexed: BTreeSet<_> =
                    r.ledger().for_date(*date).map(|rec| rec.id).collect();
                prop_assert_eq!(indexed, full_scan_for_date(&r, *date));
            }
            for s in 0..STUDENTS + 2 {
                let code = code_for(s);
                let indexed: BTreeSet<_> =
                    r.list_for_student(&code).into_iter().map(|rec| rec.id).collect();
                prop_assert_eq!(indexed, full_scan_for_student(&r, &code));
            }
        }

        for op in r.drain_pending_ops().into_iter().rev() {
            prop_assert!(r.revert(op).is_ok());
        }
        prop_assert_eq!(snapshot(&r), baseline);
    }

    #[test]
    fn list_for_date_is_sorted_by_time(minutes in prop::collection::vec(0u16..1440, 1..STUDENTS as usize)) {
        let mut r = Registrar::new();
        for (i, minute) in minutes.iter().enumerate() {
            let student = i as u8;
            r.add_student(draft_for(student), base_time()).expect("seed");
            let now = base_time() + Duration::minutes(i64::from(*minute));
            prop_assert!(r.register_attendance(&code_for(student), now).expect("register").is_registered());
        }
        let listed = r.list_attendance(base_time().date());
        prop_assert_eq!(listed.len(), minutes.len());
        for pair in listed.windows(2) {
            prop_assert!(pair[0].time_of_day <= pair[1].time_of_day);
        }
    }
}
