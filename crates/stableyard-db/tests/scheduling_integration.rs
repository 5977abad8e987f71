//! Training-class scheduling against a real SQLite database
//!
//! Covers booking conflicts under both policies, rescheduling with interval
//! overlap, the pending → completed/cancelled state machine and concurrent
//! booking of the same slot, including against unrelated writers on a
//! file-backed database.

use chrono::{Days, NaiveDate};
use rstest::*;
use rust_decimal::Decimal;
use stableyard_core::{
	BodyCondition, ClassFilter, ClassStatus, ConflictPolicy, Error, HorseData, NewBooking,
	NewUser, NewVetCheck, Reschedule, Role, RoleSet, TimeSlot, User,
};
use stableyard_db::{
	BOOKING_CONFLICT, PoolConfig, RESCHEDULE_CONFLICT, SqliteRepository, StableRepository, connect,
	connect_in_memory, migrate,
};
use tempfile::TempDir;

/// Repository with one trainer, two clients and two horses.
struct Stable {
	repo: SqliteRepository,
	trainer: User,
	other_trainer: User,
	client: User,
	other_client: User,
	horse: i64,
	other_horse: i64,
}

async fn user(repo: &SqliteRepository, username: &str, role: Role) -> User {
	let user = repo
		.create_user(NewUser {
			username: username.to_string(),
			first_name: username.to_string(),
			email: format!("{}@example.com", username),
			password_hash: "unused".to_string(),
		})
		.await
		.unwrap();
	repo.get_or_create_profile(user.id, RoleSet::single(role))
		.await
		.unwrap();
	user
}

async fn horse(repo: &SqliteRepository, name: &str, owner: i64) -> i64 {
	repo.create_horse(HorseData {
		name: name.to_string(),
		breed: "Criollo".to_string(),
		age: 6,
		color: "bay".to_string(),
		owner_id: owner,
		active: true,
	})
	.await
	.unwrap()
	.id
}

#[fixture]
async fn stable() -> Stable {
	let repo = SqliteRepository::new(connect_in_memory().await.unwrap());
	let trainer = user(&repo, "trainer1", Role::Trainer).await;
	let other_trainer = user(&repo, "trainer2", Role::Trainer).await;
	let client = user(&repo, "client1", Role::Client).await;
	let other_client = user(&repo, "client2", Role::Client).await;
	let horse_id = horse(&repo, "Luna", client.id).await;
	let other_horse = horse(&repo, "Rayo", other_client.id).await;
	Stable {
		repo,
		trainer,
		other_trainer,
		client,
		other_client,
		horse: horse_id,
		other_horse,
	}
}

fn june_first() -> NaiveDate {
	NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn slot(value: &str) -> TimeSlot {
	value.parse().unwrap()
}

fn booking(trainer: i64, client: i64, horse: i64, value: &str) -> NewBooking {
	NewBooking {
		trainer_id: trainer,
		client_id: client,
		horse_id: horse,
		date: june_first(),
		slot: slot(value),
		training_type: "dressage".to_string(),
	}
}

#[rstest]
#[case(ConflictPolicy::ExactStart)]
#[case(ConflictPolicy::Overlap)]
#[tokio::test]
async fn test_identical_slot_is_rejected_regardless_of_horse_and_client(
	#[future] stable: Stable,
	#[case] policy: ConflictPolicy,
) {
	let s = stable.await;

	let first = s
		.repo
		.book_class(booking(s.trainer.id, s.client.id, s.horse, "08:00-09:00"), policy)
		.await
		.unwrap();
	assert_eq!(first.status, ClassStatus::Pending);
	assert_eq!(first.trainer_username, "trainer1");
	assert_eq!(first.horse_name, "Luna");

	let err = s
		.repo
		.book_class(
			booking(s.trainer.id, s.other_client.id, s.other_horse, "08:00-09:00"),
			policy,
		)
		.await
		.unwrap_err();
	assert_eq!(err, Error::Conflict(BOOKING_CONFLICT.to_string()));

	let classes = s
		.repo
		.list_trainer_classes(s.trainer.id, ClassFilter::All)
		.await
		.unwrap();
	assert_eq!(classes.len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_same_slot_with_another_trainer_is_allowed(#[future] stable: Stable) {
	let s = stable.await;
	let policy = ConflictPolicy::Overlap;

	s.repo
		.book_class(booking(s.trainer.id, s.client.id, s.horse, "08:00-09:00"), policy)
		.await
		.unwrap();
	s.repo
		.book_class(
			booking(s.other_trainer.id, s.client.id, s.horse, "08:00-09:00"),
			policy,
		)
		.await
		.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_cancelled_class_frees_its_slot(#[future] stable: Stable) {
	let s = stable.await;
	let policy = ConflictPolicy::Overlap;

	let first = s
		.repo
		.book_class(booking(s.trainer.id, s.client.id, s.horse, "09:00-10:00"), policy)
		.await
		.unwrap();
	s.repo.cancel_class(first.id).await.unwrap();

	let second = s
		.repo
		.book_class(booking(s.trainer.id, s.other_client.id, s.horse, "09:00-10:00"), policy)
		.await
		.unwrap();
	assert_ne!(first.id, second.id);
}

#[rstest]
#[tokio::test]
async fn test_exact_start_policy_lets_partial_overlap_through(#[future] stable: Stable) {
	let s = stable.await;

	let class = s
		.repo
		.book_class(
			booking(s.trainer.id, s.client.id, s.horse, "09:00-10:00"),
			ConflictPolicy::Overlap,
		)
		.await
		.unwrap();
	s.repo
		.reschedule_class(
			class.id,
			Reschedule {
				date: june_first(),
				slot: slot("08:30-09:30"),
			},
		)
		.await
		.unwrap();

	let proposed = booking(s.trainer.id, s.other_client.id, s.other_horse, "08:00-09:00");
	let err = s
		.repo
		.book_class(proposed.clone(), ConflictPolicy::Overlap)
		.await
		.unwrap_err();
	assert_eq!(err.status_code(), 409);

	s.repo
		.book_class(proposed, ConflictPolicy::ExactStart)
		.await
		.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_reschedule_into_overlap_is_rejected(#[future] stable: Stable) {
	let s = stable.await;
	let policy = ConflictPolicy::Overlap;

	s.repo
		.book_class(booking(s.trainer.id, s.client.id, s.horse, "09:00-10:00"), policy)
		.await
		.unwrap();
	let movable = s
		.repo
		.book_class(booking(s.trainer.id, s.other_client.id, s.other_horse, "11:00-12:00"), policy)
		.await
		.unwrap();

	let err = s
		.repo
		.reschedule_class(
			movable.id,
			Reschedule {
				date: june_first(),
				slot: slot("09:30-10:30"),
			},
		)
		.await
		.unwrap_err();
	assert_eq!(err, Error::Conflict(RESCHEDULE_CONFLICT.to_string()));

	let unchanged = s.repo.find_class(movable.id).await.unwrap();
	assert_eq!(unchanged.slot, slot("11:00-12:00"));
}

#[rstest]
#[tokio::test]
async fn test_reschedule_may_overlap_its_own_previous_time(#[future] stable: Stable) {
	let s = stable.await;

	let class = s
		.repo
		.book_class(
			booking(s.trainer.id, s.client.id, s.horse, "09:00-10:00"),
			ConflictPolicy::Overlap,
		)
		.await
		.unwrap();
	let moved = s
		.repo
		.reschedule_class(
			class.id,
			Reschedule {
				date: june_first(),
				slot: slot("09:30-10:30"),
			},
		)
		.await
		.unwrap();
	assert_eq!(moved.slot, slot("09:30-10:30"));
	assert_eq!(moved.status, ClassStatus::Pending);
}

#[rstest]
#[tokio::test]
async fn test_reschedule_to_another_date_ignores_that_days_completed_classes(
	#[future] stable: Stable,
) {
	let s = stable.await;
	let policy = ConflictPolicy::Overlap;
	let other_day = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();

	let mut done = booking(s.trainer.id, s.client.id, s.horse, "10:00-11:00");
	done.date = other_day;
	let done = s.repo.book_class(done, policy).await.unwrap();
	s.repo.complete_class(done.id, None).await.unwrap();

	let class = s
		.repo
		.book_class(booking(s.trainer.id, s.client.id, s.horse, "10:00-11:00"), policy)
		.await
		.unwrap();
	let moved = s
		.repo
		.reschedule_class(
			class.id,
			Reschedule {
				date: other_day,
				slot: slot("10:00-11:00"),
			},
		)
		.await
		.unwrap();
	assert_eq!(moved.date, other_day);
}

#[rstest]
#[tokio::test]
async fn test_terminal_states_reject_every_transition(#[future] stable: Stable) {
	let s = stable.await;
	let policy = ConflictPolicy::Overlap;

	let class = s
		.repo
		.book_class(booking(s.trainer.id, s.client.id, s.horse, "14:00-15:00"), policy)
		.await
		.unwrap();
	let done = s
		.repo
		.complete_class(class.id, Some("Good session".to_string()))
		.await
		.unwrap();
	assert_eq!(done.status, ClassStatus::Completed);
	assert_eq!(done.observations, "Good session");

	let again = s.repo.complete_class(class.id, None).await.unwrap_err();
	assert_eq!(again.to_string(), "This class was already processed");
	let cancel = s.repo.cancel_class(class.id).await.unwrap_err();
	assert_eq!(cancel.to_string(), "This class was already processed");
	let moved = s
		.repo
		.reschedule_class(
			class.id,
			Reschedule {
				date: june_first(),
				slot: slot("15:00-16:00"),
			},
		)
		.await
		.unwrap_err();
	assert_eq!(moved.to_string(), "Only pending classes can be rescheduled");

	let stored = s.repo.find_class(class.id).await.unwrap();
	assert_eq!(stored.status, ClassStatus::Completed);
	assert_eq!(stored.slot, slot("14:00-15:00"));
}

#[rstest]
#[tokio::test]
async fn test_complete_without_observations_keeps_existing(#[future] stable: Stable) {
	let s = stable.await;
	let class = s
		.repo
		.book_class(
			booking(s.trainer.id, s.client.id, s.horse, "15:00-16:00"),
			ConflictPolicy::Overlap,
		)
		.await
		.unwrap();
	let done = s.repo.complete_class(class.id, None).await.unwrap();
	assert_eq!(done.observations, "");
}

#[rstest]
#[tokio::test]
async fn test_unknown_class_is_not_found(#[future] stable: Stable) {
	let s = stable.await;
	assert_eq!(s.repo.cancel_class(999).await.unwrap_err().status_code(), 404);
	assert_eq!(s.repo.find_class(999).await.unwrap_err().status_code(), 404);
}

#[rstest]
#[tokio::test]
async fn test_trainer_filter_and_ordering(#[future] stable: Stable) {
	let s = stable.await;
	let policy = ConflictPolicy::Overlap;

	let late = s
		.repo
		.book_class(booking(s.trainer.id, s.client.id, s.horse, "16:00-17:00"), policy)
		.await
		.unwrap();
	let early = s
		.repo
		.book_class(booking(s.trainer.id, s.client.id, s.horse, "08:00-09:00"), policy)
		.await
		.unwrap();
	let middle = s
		.repo
		.book_class(booking(s.trainer.id, s.client.id, s.horse, "12:00-13:00"), policy)
		.await
		.unwrap();
	s.repo.cancel_class(middle.id).await.unwrap();

	let all = s
		.repo
		.list_trainer_classes(s.trainer.id, ClassFilter::All)
		.await
		.unwrap();
	let ids: Vec<i64> = all.iter().map(|c| c.id).collect();
	assert_eq!(ids, vec![early.id, middle.id, late.id]);

	let pending = s
		.repo
		.list_trainer_classes(s.trainer.id, ClassFilter::Pending)
		.await
		.unwrap();
	assert_eq!(pending.len(), 2);
	let cancelled = s
		.repo
		.list_trainer_classes(s.trainer.id, ClassFilter::Cancelled)
		.await
		.unwrap();
	assert_eq!(cancelled.len(), 1);
	assert_eq!(cancelled[0].id, middle.id);

	let mine = s.repo.list_client_classes(s.client.id).await.unwrap();
	let ids: Vec<i64> = mine.iter().map(|c| c.id).collect();
	assert_eq!(ids, vec![late.id, middle.id, early.id]);
}

#[rstest]
#[tokio::test]
async fn test_concurrent_bookings_for_one_slot_yield_one_class(#[future] stable: Stable) {
	let s = stable.await;
	let policy = ConflictPolicy::ExactStart;

	let attempts = (0..8).map(|i| {
		let repo = s.repo.clone();
		let request = booking(
			s.trainer.id,
			if i % 2 == 0 { s.client.id } else { s.other_client.id },
			s.horse,
			"10:00-11:00",
		);
		tokio::spawn(async move { repo.book_class(request, policy).await })
	});

	let mut booked = 0;
	for attempt in attempts.collect::<Vec<_>>() {
		match attempt.await.unwrap() {
			Ok(_) => booked += 1,
			Err(err) => assert_eq!(err, Error::Conflict(BOOKING_CONFLICT.to_string())),
		}
	}
	assert_eq!(booked, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bookings_succeed_while_vet_checks_are_written() {
	let dir = TempDir::new().unwrap();
	let url = format!("sqlite://{}", dir.path().join("stable.db").display());
	let pool = connect(&url, &PoolConfig::default()).await.unwrap();
	migrate(&pool).await.unwrap();
	let repo = SqliteRepository::new(pool);

	let trainer = user(&repo, "trainer1", Role::Trainer).await;
	let client = user(&repo, "client1", Role::Client).await;
	let vet = user(&repo, "vet1", Role::Veterinarian).await;
	let horse_id = horse(&repo, "Luna", client.id).await;

	let writer = {
		let repo = repo.clone();
		tokio::spawn(async move {
			for _ in 0..200 {
				repo.add_vet_check(NewVetCheck {
					horse_id,
					veterinarian_id: vet.id,
					weight: Decimal::new(45050, 2),
					body_condition: BodyCondition::new(5).unwrap(),
					feeding: "hay".to_string(),
					observations: String::new(),
				})
				.await?;
			}
			Ok::<_, Error>(())
		})
	};

	let bookings: Vec<_> = (0..100u64)
		.map(|day| {
			let repo = repo.clone();
			let request = NewBooking {
				date: june_first() + Days::new(day),
				..booking(trainer.id, client.id, horse_id, "09:00-10:00")
			};
			tokio::spawn(async move { repo.book_class(request, ConflictPolicy::Overlap).await })
		})
		.collect();

	for attempt in bookings {
		attempt.await.unwrap().unwrap();
	}
	writer.await.unwrap().unwrap();

	let classes = repo
		.list_trainer_classes(trainer.id, ClassFilter::All)
		.await
		.unwrap();
	assert_eq!(classes.len(), 100);
	assert_eq!(repo.list_vet_checks(horse_id).await.unwrap().len(), 200);
}
