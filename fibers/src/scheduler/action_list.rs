use super::ScheduledAction;

use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::time::Instant;

/// Pending scheduled actions ordered by due time.
///
/// Entries with equal due times keep their insertion order. The list has a
/// single writer: the scheduler only touches it from work running on its
/// own fiber.
#[derive(Default)]
pub struct ScheduledActionList {
  actions: BTreeMap<(Instant, u64), ScheduledAction>,
  next_seq: u64,
}

impl ScheduledActionList {
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts `action` at its current due time.
  pub fn add(&mut self, action: ScheduledAction) {
    let seq = self.next_seq;
    self.next_seq += 1;
    self.actions.insert((action.scheduled_at(), seq), action);
  }

  /// Number of entries, including cancelled ones not yet purged.
  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  /// Number of entries that have not been cancelled.
  pub fn pending(&self) -> usize {
    self.actions.values().filter(|a| !a.is_cancelled()).count()
  }

  /// The earliest due time among live entries, or `None` if there are none.
  pub fn next_scheduled_action_time(&self) -> Option<Instant> {
    self
      .actions
      .iter()
      .find(|(_, action)| !action.is_cancelled())
      .map(|((at, _), _)| *at)
  }

  /// Removes and returns every live entry due at or before `now`, earliest
  /// first. Cancelled entries in that range are discarded.
  pub fn take_expired_actions(&mut self, now: Instant) -> Vec<ScheduledAction> {
    // `seq` never reaches `u64::MAX`, so every entry due at `now` sorts
    // before the split key.
    let later = self.actions.split_off(&(now, u64::MAX));
    let expired = mem::replace(&mut self.actions, later);
    expired
      .into_values()
      .filter(|action| !action.is_cancelled())
      .collect()
  }

  /// Drops cancelled entries. Returns how many were removed.
  pub fn remove_cancelled(&mut self) -> usize {
    let before = self.actions.len();
    self.actions.retain(|_, action| !action.is_cancelled());
    before - self.actions.len()
  }
}

impl fmt::Debug for ScheduledActionList {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ScheduledActionList")
      .field("len", &self.actions.len())
      .field("next", &self.next_scheduled_action_time())
      .finish()
  }
}
