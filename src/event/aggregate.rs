use super::CanonicalEvent;

/// Sum of signed amounts over a collection of events.
///
/// Unstake amounts are already negative, so the result is the net staked
/// position. An empty collection yields zero. Returns `None` when the net
/// position or either side of it exceeds 128 bits; no wrapped total is
/// produced. Stakes and unstakes are summed separately, so the outcome does
/// not depend on the order of the events.
pub fn net_total(events: &[CanonicalEvent]) -> Option<i128> {
	let (mut staked, mut unstaked) = (0u128, 0u128);
	for event in events {
		let amount = event.signed_amount();
		if amount >= 0 {
			staked = staked.checked_add(amount.unsigned_abs())?;
		} else {
			unstaked = unstaked.checked_add(amount.unsigned_abs())?;
		}
	}

	if staked >= unstaked {
		i128::try_from(staked - unstaked).ok()
	} else {
		0i128.checked_sub_unsigned(unstaked - staked)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::EventKind;

	fn event(kind: EventKind, amount: u128, ts: u64) -> CanonicalEvent {
		CanonicalEvent::new(kind, "0xPOOL", "0xAA", amount, ts, ts + 100)
			.expect("valid event")
	}

	#[test]
	fn empty_collection_is_zero() {
		assert_eq!(net_total(&[]), Some(0));
	}

	#[test]
	fn unstakes_reduce_the_total() {
		let events = vec![
			event(EventKind::Staked, 50, 10),
			event(EventKind::Unstaked, 20, 20),
			event(EventKind::Staked, 7, 30),
		];
		assert_eq!(net_total(&events), Some(37));
	}

	#[test]
	fn order_does_not_change_the_total() {
		let mut events = vec![
			event(EventKind::Staked, 500, 1),
			event(EventKind::Unstaked, 120, 2),
			event(EventKind::Staked, 3, 3),
			event(EventKind::Unstaked, 383, 4),
			event(EventKind::Staked, 1_000_000, 5),
		];
		let expected = net_total(&events);

		events.reverse();
		assert_eq!(net_total(&events), expected);

		events.rotate_left(2);
		assert_eq!(net_total(&events), expected);

		events.swap(0, 3);
		assert_eq!(net_total(&events), expected);
	}

	#[test]
	fn total_beyond_i128_is_none() {
		let events = vec![
			event(EventKind::Staked, i128::MAX as u128, 1),
			event(EventKind::Staked, 1, 2),
		];
		assert_eq!(net_total(&events), None);
	}

	#[test]
	fn large_amounts_that_cancel_out_still_sum() {
		let events = vec![
			event(EventKind::Staked, i128::MAX as u128, 1),
			event(EventKind::Staked, 5, 2),
			event(EventKind::Unstaked, i128::MAX as u128, 3),
		];
		assert_eq!(net_total(&events), Some(5));

		let mut reversed = events;
		reversed.reverse();
		assert_eq!(net_total(&reversed), Some(5));
	}
}
