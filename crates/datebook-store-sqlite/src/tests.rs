//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use chrono::{DateTime, Duration, TimeZone as _, Utc};
use datebook_core::{
  budget::{NewContribution, NewExpense},
  diary::NewDiaryEntry,
  event::{Event, NewEvent, Participant, UserId},
  store::{CalendarStore, Guarded},
  user::UserUpsert,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2030, 1, 10, h, m, 0).unwrap()
}

fn new_event(owner: UserId, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> NewEvent {
  NewEvent {
    owner_id:     owner,
    title:        title.to_owned(),
    start_at:     start,
    end_at:       end,
    participants: Vec::new(),
  }
}

async fn create(s: &SqliteStore, input: NewEvent) -> Event {
  match s.create_event(input).await.unwrap() {
    Guarded::Written(event) => event,
    Guarded::Overlap => panic!("unexpected overlap"),
  }
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_event() {
  let s = store().await;
  let mut input = new_event(1, "Standup", at(8, 0), at(8, 30));
  input.participants = vec![
    Participant::User { user_id: 2 },
    Participant::Label { label: "bob".into() },
  ];

  let event = create(&s, input).await;
  assert_eq!(event.title, "Standup");
  assert_eq!(event.start_at, at(8, 0));
  assert_eq!(event.end_at, at(8, 30));
  assert!(!event.reminder_sent);
  assert_eq!(event.participants.len(), 2);

  let fetched = s.get_event(event.event_id).await.unwrap().unwrap();
  assert_eq!(fetched, event);
}

#[tokio::test]
async fn get_missing_event_returns_none() {
  let s = store().await;
  assert!(s.get_event(999).await.unwrap().is_none());
}

#[tokio::test]
async fn participant_order_is_preserved() {
  let s = store().await;
  let mut input = new_event(1, "Review", at(10, 0), at(11, 0));
  input.participants = vec![
    Participant::Label { label: "zed".into() },
    Participant::User { user_id: 9 },
    Participant::Label { label: "amy".into() },
  ];

  let event = create(&s, input.clone()).await;
  let fetched = s.get_event(event.event_id).await.unwrap().unwrap();
  assert_eq!(fetched.participants, input.participants);
}

#[tokio::test]
async fn list_for_user_covers_owner_and_participant_in_start_order() {
  let s = store().await;
  let late = create(&s, new_event(1, "Late", at(15, 0), at(16, 0))).await;
  let mut invited = new_event(3, "Invited", at(9, 0), at(10, 0));
  invited.participants = vec![Participant::User { user_id: 1 }];
  let invited = create(&s, invited).await;
  let early = create(&s, new_event(1, "Early", at(7, 0), at(8, 0))).await;
  create(&s, new_event(4, "Unrelated", at(12, 0), at(13, 0))).await;

  let ids: Vec<_> = s
    .list_events_for_user(1)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.event_id)
    .collect();
  assert_eq!(ids, vec![early.event_id, invited.event_id, late.event_id]);
}

#[tokio::test]
async fn label_participants_are_not_involved() {
  let s = store().await;
  let mut input = new_event(1, "Lunch", at(12, 0), at(13, 0));
  input.participants = vec![Participant::Label { label: "2".into() }];
  create(&s, input).await;

  assert!(s.list_events_for_user(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn overlap_is_half_open() {
  let s = store().await;
  let event = create(&s, new_event(1, "Meeting", at(9, 0), at(10, 0))).await;

  // Touching ranges do not overlap.
  assert!(s.list_overlapping(1, at(10, 0), at(11, 0), None).await.unwrap().is_empty());
  assert!(s.list_overlapping(1, at(8, 0), at(9, 0), None).await.unwrap().is_empty());

  let hits = s.list_overlapping(1, at(9, 59), at(11, 0), None).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].event_id, event.event_id);

  let excluded = s
    .list_overlapping(1, at(9, 0), at(10, 0), Some(event.event_id))
    .await
    .unwrap();
  assert!(excluded.is_empty());
}

#[tokio::test]
async fn guarded_create_refuses_overlap_for_any_involved_user() {
  let s = store().await;
  let mut busy = new_event(2, "Busy", at(9, 0), at(10, 0));
  busy.participants = vec![Participant::User { user_id: 5 }];
  create(&s, busy).await;

  let mut clash = new_event(1, "Clash", at(9, 30), at(10, 30));
  clash.participants = vec![Participant::User { user_id: 5 }];
  assert_eq!(s.create_event(clash).await.unwrap(), Guarded::Overlap);
  assert!(s.list_events_for_user(1).await.unwrap().is_empty());

  // A different time is fine.
  let mut later = new_event(1, "Later", at(10, 0), at(11, 0));
  later.participants = vec![Participant::User { user_id: 5 }];
  create(&s, later).await;
}

#[tokio::test]
async fn update_replaces_fields_and_resets_reminder() {
  let s = store().await;
  let now = at(8, 55);
  let event = create(&s, new_event(1, "Sync", at(9, 0), at(9, 30))).await;
  let claimed = s
    .claim_due_reminders(now, Duration::minutes(10), 10, Uuid::new_v4())
    .await
    .unwrap();
  assert_eq!(claimed.len(), 1);
  assert!(claimed[0].reminder_sent);

  let mut replacement = new_event(1, "Sync (moved)", at(9, 0), at(9, 45));
  replacement.participants = vec![Participant::User { user_id: 2 }];
  let updated = match s.update_event(event.event_id, replacement).await.unwrap() {
    Some(Guarded::Written(e)) => e,
    other => panic!("unexpected {other:?}"),
  };
  assert_eq!(updated.title, "Sync (moved)");
  assert_eq!(updated.end_at, at(9, 45));
  assert_eq!(updated.participant_ids().collect::<Vec<_>>(), vec![2]);
  assert!(!updated.reminder_sent);

  // Claimable again after the reset.
  let again = s
    .claim_due_reminders(now, Duration::minutes(10), 10, Uuid::new_v4())
    .await
    .unwrap();
  assert_eq!(again.len(), 1);
}

#[tokio::test]
async fn update_excludes_itself_from_overlap() {
  let s = store().await;
  let event = create(&s, new_event(1, "Block", at(9, 0), at(10, 0))).await;
  create(&s, new_event(1, "Next", at(11, 0), at(12, 0))).await;

  let widened = s
    .update_event(event.event_id, new_event(1, "Block", at(8, 30), at(10, 30)))
    .await
    .unwrap();
  assert!(matches!(widened, Some(Guarded::Written(_))));

  let clash = s
    .update_event(event.event_id, new_event(1, "Block", at(10, 0), at(11, 30)))
    .await
    .unwrap();
  assert_eq!(clash, Some(Guarded::Overlap));
}

#[tokio::test]
async fn update_missing_event_returns_none() {
  let s = store().await;
  let result = s
    .update_event(42, new_event(1, "Ghost", at(9, 0), at(10, 0)))
    .await
    .unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn delete_removes_event() {
  let s = store().await;
  let mut input = new_event(1, "Gone", at(9, 0), at(10, 0));
  input.participants = vec![Participant::User { user_id: 2 }];
  let event = create(&s, input).await;

  assert!(s.delete_event(event.event_id).await.unwrap());
  assert!(s.get_event(event.event_id).await.unwrap().is_none());
  assert!(s.list_events_for_user(2).await.unwrap().is_empty());
  assert!(!s.delete_event(event.event_id).await.unwrap());
}

// ─── Reminders ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn claim_window_is_now_to_now_plus_lead() {
  let s = store().await;
  let lead = Duration::minutes(10);
  let started = create(&s, new_event(1, "Started", at(8, 49), at(9, 30))).await;
  let edge = create(&s, new_event(2, "Edge", at(8, 50), at(9, 30))).await;
  let due = create(&s, new_event(3, "Due", at(9, 0), at(9, 30))).await;
  let far = create(&s, new_event(4, "Far", at(9, 1), at(9, 30))).await;

  let claimed = s
    .claim_due_reminders(at(8, 50), lead, 10, Uuid::new_v4())
    .await
    .unwrap();
  let ids: Vec<_> = claimed.iter().map(|e| e.event_id).collect();
  assert_eq!(ids, vec![edge.event_id, due.event_id]);
  assert!(!ids.contains(&started.event_id));
  assert!(!ids.contains(&far.event_id));
}

#[tokio::test]
async fn event_is_claimed_exactly_once_across_polls() {
  let s = store().await;
  let lead = Duration::minutes(10);
  let event = create(&s, new_event(1, "Standup", at(9, 0), at(9, 15))).await;

  let first = s
    .claim_due_reminders(at(8, 50), lead, 50, Uuid::new_v4())
    .await
    .unwrap();
  assert_eq!(first.len(), 1);
  assert_eq!(first[0].event_id, event.event_id);

  for minute in [51, 55, 59] {
    let again = s
      .claim_due_reminders(at(8, minute), lead, 50, Uuid::new_v4())
      .await
      .unwrap();
    assert!(again.is_empty());
  }
}

#[tokio::test]
async fn claim_respects_limit_earliest_first() {
  let s = store().await;
  for (i, minute) in [9, 3, 6, 1].into_iter().enumerate() {
    create(&s, new_event(i as UserId + 1, "E", at(9, minute), at(9, 30))).await;
  }

  let batch = s
    .claim_due_reminders(at(9, 0), Duration::minutes(10), 2, Uuid::new_v4())
    .await
    .unwrap();
  let starts: Vec<_> = batch.iter().map(|e| e.start_at).collect();
  assert_eq!(starts, vec![at(9, 1), at(9, 3)]);

  let rest = s
    .claim_due_reminders(at(9, 0), Duration::minutes(10), 10, Uuid::new_v4())
    .await
    .unwrap();
  assert_eq!(rest.len(), 2);
}

#[tokio::test]
async fn concurrent_claims_on_shared_file_never_overlap() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("datebook.sqlite");
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();

  for i in 0..20 {
    create(&a, new_event(i + 1, "E", at(9, 0), at(9, 30))).await;
  }

  let now = at(8, 55);
  let lead = Duration::minutes(10);
  let mut seen = Vec::new();
  loop {
    let (x, y) = tokio::join!(
      a.claim_due_reminders(now, lead, 3, Uuid::new_v4()),
      b.claim_due_reminders(now, lead, 3, Uuid::new_v4()),
    );
    let (x, y) = (x.unwrap(), y.unwrap());
    if x.is_empty() && y.is_empty() {
      break;
    }
    seen.extend(x.into_iter().chain(y).map(|e| e.event_id));
  }

  let total = seen.len();
  seen.sort_unstable();
  seen.dedup();
  assert_eq!(seen.len(), total, "an event was claimed twice");
  assert_eq!(total, 20);
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_user_defaults_name_and_keeps_unspecified_fields() {
  let s = store().await;
  let user = s
    .upsert_user(UserUpsert { user_id: 7, ..Default::default() })
    .await
    .unwrap();
  assert_eq!(user.name, "7");
  assert!(user.tag.is_none());

  s.upsert_user(UserUpsert {
    user_id: 7,
    name:    Some("Alice".into()),
    tag:     Some("@Alice".into()),
  })
  .await
  .unwrap();
  let user = s
    .upsert_user(UserUpsert { user_id: 7, ..Default::default() })
    .await
    .unwrap();
  assert_eq!(user.name, "Alice");
  assert_eq!(user.tag.as_deref(), Some("alice"));
}

#[tokio::test]
async fn tag_moves_to_latest_holder() {
  let s = store().await;
  s.upsert_user(UserUpsert { user_id: 1, name: None, tag: Some("bob".into()) })
    .await
    .unwrap();
  s.upsert_user(UserUpsert { user_id: 2, name: None, tag: Some("@Bob".into()) })
    .await
    .unwrap();

  let matches = s.find_users_by_alias("bob").await.unwrap();
  assert_eq!(matches.len(), 1);
  assert_eq!(matches[0].user_id, 2);
  assert!(s.get_user(1).await.unwrap().unwrap().tag.is_none());
}

#[tokio::test]
async fn alias_falls_back_to_case_insensitive_name() {
  let s = store().await;
  s.upsert_user(UserUpsert { user_id: 1, name: Some("Zoë".into()), tag: None })
    .await
    .unwrap();
  s.upsert_user(UserUpsert { user_id: 2, name: Some("Max".into()), tag: None })
    .await
    .unwrap();
  s.upsert_user(UserUpsert { user_id: 3, name: Some("max".into()), tag: None })
    .await
    .unwrap();

  let zoe = s.find_users_by_alias("zoë").await.unwrap();
  assert_eq!(zoe.len(), 1);
  assert_eq!(zoe[0].user_id, 1);

  assert_eq!(s.find_users_by_alias("max").await.unwrap().len(), 2);
  assert!(s.find_users_by_alias("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn set_timezone_creates_or_updates_user() {
  let s = store().await;
  let user = s.set_timezone(5, "Europe/Warsaw".into()).await.unwrap();
  assert_eq!(user.timezone.as_deref(), Some("Europe/Warsaw"));
  assert_eq!(user.name, "5");

  s.upsert_user(UserUpsert { user_id: 5, name: Some("Eve".into()), tag: None })
    .await
    .unwrap();
  let user = s.set_timezone(5, "Asia/Tokyo".into()).await.unwrap();
  assert_eq!(user.timezone.as_deref(), Some("Asia/Tokyo"));
  assert_eq!(user.name, "Eve");
}

// ─── Diary ───────────────────────────────────────────────────────────────────

fn note(user_id: UserId, message_id: i64, text: &str) -> NewDiaryEntry {
  NewDiaryEntry {
    user_id,
    username: Some("alice".into()),
    chat_id: 100,
    message_id,
    text: text.to_owned(),
  }
}

#[tokio::test]
async fn diary_entries_are_listed_newest_first_per_user() {
  let s = store().await;
  let first = s.append_diary_entry(note(1, 1, "first")).await.unwrap();
  let second = s.append_diary_entry(note(1, 2, "second")).await.unwrap();
  s.append_diary_entry(note(2, 3, "other")).await.unwrap();

  assert_eq!(first.text, "first");
  assert_eq!(first.username.as_deref(), Some("alice"));

  let entries = s.list_diary_entries(1).await.unwrap();
  let ids: Vec<_> = entries.iter().map(|e| e.entry_id).collect();
  assert_eq!(ids, vec![second.entry_id, first.entry_id]);
}

// ─── Budget ──────────────────────────────────────────────────────────────────

fn expense(user: UserId, amount: i64, category: &str, spent_at: DateTime<Utc>) -> NewExpense {
  NewExpense {
    user_id: user,
    amount,
    category: category.to_owned(),
    spent_at,
    comment: None,
  }
}

#[tokio::test]
async fn expenses_are_listed_newest_first_and_filtered_by_user() {
  let s = store().await;
  let first = s.add_expense(expense(1, 10, "food", at(8, 0))).await.unwrap();
  let later = s.add_expense(expense(2, 20, "fuel", at(12, 0))).await.unwrap();
  let middle = s.add_expense(expense(1, 30, "food", at(10, 0))).await.unwrap();
  assert_eq!(later.spent_at, at(12, 0));

  let all: Vec<_> = s
    .list_expenses(None, 10)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.expense_id)
    .collect();
  assert_eq!(all, vec![later.expense_id, middle.expense_id, first.expense_id]);

  let mine = s.list_expenses(Some(1), 1).await.unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0].expense_id, middle.expense_id);
}

#[tokio::test]
async fn totals_group_by_user_and_category() {
  let s = store().await;
  s.upsert_user(UserUpsert { user_id: 1, name: Some("Alice".into()), tag: None })
    .await
    .unwrap();

  for (user, amount) in [(1, 100), (2, 300), (1, 50)] {
    s.add_contribution(NewContribution { user_id: user, amount, comment: None })
      .await
      .unwrap();
  }
  s.add_expense(expense(1, 40, "food", at(8, 0))).await.unwrap();
  s.add_expense(expense(2, 15, "fuel", at(9, 0))).await.unwrap();
  s.add_expense(expense(2, 5, "food", at(9, 30))).await.unwrap();

  let totals = s.budget_totals().await.unwrap();
  let contributors: Vec<_> = totals
    .contributors
    .iter()
    .map(|c| (c.user_id, c.name.as_str(), c.amount))
    .collect();
  assert_eq!(contributors, vec![(2, "2", 300), (1, "Alice", 150)]);

  let spenders: Vec<_> = totals.spenders.iter().map(|c| (c.user_id, c.amount)).collect();
  assert_eq!(spenders, vec![(1, 40), (2, 20)]);

  let categories: Vec<_> = totals
    .categories
    .iter()
    .map(|c| (c.category.as_str(), c.amount))
    .collect();
  assert_eq!(categories, vec![("food", 45), ("fuel", 15)]);
}

#[tokio::test]
async fn spent_between_is_half_open() {
  let s = store().await;
  assert_eq!(s.spent_between(at(0, 0), at(23, 59)).await.unwrap(), 0);

  s.add_expense(expense(1, 10, "food", at(8, 0))).await.unwrap();
  s.add_expense(expense(1, 20, "food", at(9, 0))).await.unwrap();
  s.add_expense(expense(1, 40, "food", at(10, 0))).await.unwrap();

  assert_eq!(s.spent_between(at(8, 0), at(10, 0)).await.unwrap(), 30);
  assert_eq!(s.spent_between(at(8, 1), at(10, 1)).await.unwrap(), 60);
}

#[tokio::test]
async fn daily_limit_starts_unset_and_can_be_cleared() {
  let s = store().await;
  let initial = s.get_daily_limit().await.unwrap();
  assert_eq!(initial.daily_limit, None);
  assert_eq!(initial.updated_by, None);

  let set = s.set_daily_limit(Some(500), 3).await.unwrap();
  assert_eq!(set.daily_limit, Some(500));
  assert_eq!(set.updated_by, Some(3));
  assert!(set.updated_at.is_some());
  assert_eq!(s.get_daily_limit().await.unwrap(), set);

  let cleared = s.set_daily_limit(None, 4).await.unwrap();
  assert_eq!(cleared.daily_limit, None);
  assert_eq!(cleared.updated_by, Some(4));
}
