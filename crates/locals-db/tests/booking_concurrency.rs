use std::sync::Arc;
use std::thread;

use locals_db::Database;
use locals_db::models::{BookingOutcome, NewEvent, NewUser};
use locals_types::models::{AuthProvider, EventId, UserId};

fn user(db: &Database, n: usize) -> UserId {
    let username = format!("user{n}@example.com");
    db.create_user(&NewUser {
        username: &username,
        password_hash: Some("hash"),
        first_name: "",
        last_name: "",
        is_traveler: true,
        is_host: n == 0,
        auth_provider: AuthProvider::Local,
    })
    .unwrap()
}

fn event(db: &Database, host: UserId) -> EventId {
    db.create_event(&NewEvent {
        title: "Rooftop concert",
        description: "",
        unique_aspect: "",
        host_id: host,
        number_of_guests: Some(100),
        occurence_date: None,
        duration_minutes: None,
        location: "Downtown",
        latitude: None,
        longitude: None,
        price_cents: 2000,
        photos: &[],
        tags: &[],
    })
    .unwrap()
}

fn stored_count(db: &Database, event_id: EventId) -> i64 {
    db.get_event(event_id).unwrap().unwrap().number_of_bookings
}

#[test]
fn concurrent_registrations_by_same_guest_count_once() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let host = user(&db, 0);
    let guest = user(&db, 1);
    let ev = event(&db, host);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            thread::spawn(move || db.register_booking(ev, guest).unwrap())
        })
        .collect();
    let outcomes: Vec<BookingOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let created = outcomes
        .iter()
        .filter(|o| matches!(o, BookingOutcome::Created(_)))
        .count();
    assert_eq!(created, 1);
    assert!(outcomes.iter().all(|o| o.id() == outcomes[0].id()));
    assert_eq!(stored_count(&db, ev), 1);
}

#[test]
fn concurrent_registrations_by_many_guests() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let host = user(&db, 0);
    let ev = event(&db, host);
    let guests: Vec<UserId> = (1..=20).map(|n| user(&db, n)).collect();

    let handles: Vec<_> = guests
        .iter()
        .map(|&guest| {
            let db = db.clone();
            thread::spawn(move || db.register_booking(ev, guest).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(stored_count(&db, ev), 20);
    assert_eq!(db.count_bookings(ev).unwrap(), 20);
}

#[test]
fn concurrent_deletes_leave_true_count() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let host = user(&db, 0);
    let ev = event(&db, host);
    let bookings: Vec<i64> = (1..=12)
        .map(|n| {
            let guest = user(&db, n);
            db.register_booking(ev, guest).unwrap().id()
        })
        .collect();

    // Delete the first 8, two threads racing on each booking
    let handles: Vec<_> = bookings[..8]
        .iter()
        .flat_map(|&id| [id, id])
        .map(|id| {
            let db = db.clone();
            thread::spawn(move || db.delete_booking(id).is_ok())
        })
        .collect();
    let succeeded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(succeeded, 8);
    assert_eq!(db.count_bookings(ev).unwrap(), 4);
    assert_eq!(stored_count(&db, ev), 4);
}
