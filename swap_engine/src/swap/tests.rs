use super::*;
use crate::config::{TokenPair, WalletBalances};
use crate::test_fixtures::price_map;
use assert_matches::assert_matches;
use maplit::btreemap;

const FEE: f64 = 0.001;

fn usd_eth_prices() -> PriceMap {
    price_map(btreemap! {"USD" => 1.0, "ETH" => 3000.0})
}

fn form_with_amount(amount: &str) -> SwapForm {
    let mut form = SwapForm::new(
        &TokenPair::default(),
        &WalletBalances::default(),
        Some(&usd_eth_prices()),
    );
    form.edit_from_amount(amount, FEE).unwrap();
    form
}

fn pending_machine() -> (ConfirmationMachine, SwapSnapshot) {
    let mut machine = ConfirmationMachine::default();
    let snapshot = machine
        .submit(&form_with_amount("100"), &TradeLimits::default())
        .unwrap();
    (machine, snapshot)
}

#[test]
fn should_capture_snapshot_on_submit() {
    let (machine, snapshot) = pending_machine();

    assert_eq!(
        snapshot,
        SwapSnapshot {
            from_token: "USD".to_string(),
            to_token: "ETH".to_string(),
            from_amount: 100.0,
            to_amount: 0.0333,
            exchange_rate: 1.0 / 3000.0,
        }
    );
    assert_eq!(
        machine.state(),
        &ConfirmationState::PendingConfirmation(snapshot)
    );
    assert!(machine.state().can_confirm());
}

#[test]
fn should_not_be_affected_by_later_form_edits() {
    let mut form = form_with_amount("100");
    let mut machine = ConfirmationMachine::default();
    let snapshot = machine.submit(&form, &TradeLimits::default()).unwrap();

    form.edit_from_amount("250", FEE).unwrap();
    form.toggle_direction(&WalletBalances::default());

    assert_eq!(machine.state().snapshot(), Some(&snapshot));
    assert_eq!(machine.begin_execution().unwrap().from_amount, 100.0);
}

#[test]
fn should_block_invalid_submission() {
    let mut machine = ConfirmationMachine::default();
    let result = machine.submit(&form_with_amount("5000"), &TradeLimits::default());

    assert_matches!(result, Err(SwapError::ValidationFailed(outcome)) if !outcome.is_valid());
    assert_eq!(machine.state(), &ConfirmationState::Idle);
}

#[test]
fn should_reject_submit_unless_idle() {
    let (mut machine, _) = pending_machine();
    assert_eq!(
        machine.submit(&form_with_amount("1"), &TradeLimits::default()),
        Err(SwapError::NotIdle)
    );

    machine.begin_execution().unwrap();
    assert_eq!(
        machine.submit(&form_with_amount("1"), &TradeLimits::default()),
        Err(SwapError::NotIdle)
    );
}

#[test]
fn should_cancel_pending_confirmation() {
    let (mut machine, snapshot) = pending_machine();

    assert_eq!(machine.cancel(), Ok(snapshot));
    assert_eq!(machine.state(), &ConfirmationState::Idle);
    assert_eq!(machine.cancel(), Err(SwapError::NoPendingConfirmation));
}

#[test]
fn should_not_cancel_while_submitting() {
    let (mut machine, snapshot) = pending_machine();
    machine.begin_execution().unwrap();

    assert_eq!(machine.cancel(), Err(SwapError::AlreadySubmitting));
    assert_eq!(machine.state(), &ConfirmationState::Submitting(snapshot));
}

#[test]
fn should_refuse_duplicate_submission() {
    let (mut machine, _) = pending_machine();

    machine.begin_execution().unwrap();

    assert!(!machine.state().can_confirm());
    assert_eq!(machine.begin_execution(), Err(SwapError::AlreadySubmitting));
}

#[test]
fn should_return_to_idle_on_success() {
    let (mut machine, snapshot) = pending_machine();
    machine.begin_execution().unwrap();

    let executed = machine.finish_execution(Ok(SwapResponse { success: true }));

    assert_eq!(executed, Ok(snapshot));
    assert_eq!(machine.state(), &ConfirmationState::Idle);
}

#[test]
fn should_return_to_pending_on_failure() {
    let (mut machine, snapshot) = pending_machine();

    machine.begin_execution().unwrap();
    assert_eq!(
        machine.finish_execution(Ok(SwapResponse { success: false })),
        Err(SwapError::Rejected)
    );
    assert_eq!(
        machine.state(),
        &ConfirmationState::PendingConfirmation(snapshot.clone())
    );

    machine.begin_execution().unwrap();
    assert_eq!(
        machine.finish_execution(Err(TransportError::unknown())),
        Err(SwapError::Transport(TransportError::unknown()))
    );
    assert_eq!(
        machine.state(),
        &ConfirmationState::PendingConfirmation(snapshot)
    );
}

#[test]
fn should_only_finish_while_submitting() {
    let (mut machine, _) = pending_machine();
    assert_eq!(
        machine.finish_execution(Ok(SwapResponse { success: true })),
        Err(SwapError::NotSubmitting)
    );
}

#[test]
fn should_send_only_trade_parameters() {
    let (_, snapshot) = pending_machine();
    assert_eq!(
        snapshot.to_request(),
        SwapRequest {
            from_token: "USD".to_string(),
            to_token: "ETH".to_string(),
            from_amount: 100.0,
            exchange_rate: 1.0 / 3000.0,
        }
    );
}

mod preview {
    use super::*;

    #[test]
    fn should_preview_usd_values() {
        let (_, snapshot) = pending_machine();
        let prices = usd_eth_prices();

        let preview = ConfirmationPreview::new(&snapshot, Some(&prices), "USD", FEE);

        assert_eq!(preview.from.usd_value, 100.0);
        assert_eq!(preview.to.token, "ETH");
        assert_eq!(preview.to.amount, 0.0333);
        assert!((preview.to.usd_value - 99.9).abs() < 1e-9);
        assert_eq!(preview.fee_percentage, 0.1);
        assert_eq!(preview.provider_fees.token, "USD");
        assert!((preview.provider_fees.amount - 100.0 / 3000.0 * FEE).abs() < 1e-15);
    }

    #[test]
    fn should_degrade_to_zero_without_prices() {
        let (_, snapshot) = pending_machine();

        let preview = ConfirmationPreview::new(&snapshot, None, "USD", FEE);
        assert_eq!(preview.from.usd_value, 0.0);
        assert_eq!(preview.to.usd_value, 0.0);

        let without_anchor = price_map(btreemap! {"ETH" => 3000.0});
        let preview = ConfirmationPreview::new(&snapshot, Some(&without_anchor), "USD", FEE);
        assert_eq!(preview.to.usd_value, 0.0);
        assert_eq!(
            preview.to.to_string(),
            "0.03330 ETH (≈ $ 0.00000)"
        );
    }

    #[test]
    fn should_render_review() {
        let (_, snapshot) = pending_machine();
        let prices = usd_eth_prices();

        let rendered = ConfirmationPreview::new(&snapshot, Some(&prices), "USD", FEE).to_string();

        assert!(rendered.contains("Swap:            100.00000 USD (≈ $ 100.00000)"));
        assert!(rendered.contains("Fees:            0.1%"));
    }
}
