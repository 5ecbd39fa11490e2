//! Prebuilt steps for the booking journey under test.
//!
//! One definition per interaction, with the selector fallbacks and retry
//! budgets that the old one-off probe scripts duplicated inline. The
//! shared journey prefix lives in [`reach_payment`]; payment variants
//! extend it instead of restating it.

use crate::runner::Flow;
use crate::step::{FlowStep, PostCondition, Selector};

/// Retry budget for steps that race the site's widget rendering
const DYNAMIC_RETRIES: u32 = 2;

/// Timeout for steps against dynamically populated widgets (5s)
const DYNAMIC_TIMEOUT_MS: u64 = 5_000;

/// Quote a string as a JavaScript literal
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Choose a service by its duration label (e.g. `"90min"`)
#[must_use]
pub fn select_service(duration: &str) -> FlowStep {
    FlowStep::click(
        "select-service",
        Selector::new(format!("[data-service='{duration}']"))
            .or(format!(".service-card[data-duration='{duration}']")),
    )
    .with_retries(DYNAMIC_RETRIES)
    .with_timeout_ms(DYNAMIC_TIMEOUT_MS)
}

/// Pick the first date the calendar marks as available
#[must_use]
pub fn pick_next_available_date() -> FlowStep {
    FlowStep::click(
        "pick-next-available-date",
        Selector::new(".date-picker .available").or(".calendar-day:not(.disabled)"),
    )
    .with_retries(DYNAMIC_RETRIES)
    .with_timeout_ms(DYNAMIC_TIMEOUT_MS)
}

/// Pick the first offered time slot (first match, deterministically)
#[must_use]
pub fn pick_first_time_slot() -> FlowStep {
    FlowStep::click(
        "pick-first-time-slot",
        Selector::new(".time-slot").or(".time-slots button"),
    )
    .with_retries(DYNAMIC_RETRIES)
    .with_timeout_ms(DYNAMIC_TIMEOUT_MS)
}

/// Fill the contact form in one atomic step.
///
/// Runs as a single in-page script so the journey stays one step per
/// screen; a missing field throws, surfacing as an evaluation error.
#[must_use]
pub fn fill_contact(name: &str, email: &str, phone: &str) -> FlowStep {
    let script = format!(
        "(() => {{ \
         const set = (sel, value) => {{ \
           const el = document.querySelector(sel); \
           if (!el) throw new Error('missing field ' + sel); \
           el.value = value; \
           el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         }}; \
         set('#contact-name', {name}); \
         set('#contact-email', {email}); \
         set('#contact-phone', {phone}); }})()",
        name = js_string(name),
        email = js_string(email),
        phone = js_string(phone),
    );
    FlowStep::evaluate("fill-contact", script).with_timeout_ms(DYNAMIC_TIMEOUT_MS)
}

/// Choose a payment method (e.g. `"cash"`, `"credit_card"`)
#[must_use]
pub fn select_payment(method: &str) -> FlowStep {
    FlowStep::click(
        "select-payment",
        Selector::new(format!("[data-payment='{method}']"))
            .or(format!("#payment-{method}")),
    )
    .with_retries(DYNAMIC_RETRIES)
    .with_timeout_ms(DYNAMIC_TIMEOUT_MS)
}

/// Submit the booking and assert the thank-you node appears.
///
/// The thank-you element is the flow's explicit success post-condition;
/// override it per flow if the site variant confirms differently.
#[must_use]
pub fn confirm() -> FlowStep {
    FlowStep::click("confirm", Selector::new("#confirm-booking").or(".confirm-button"))
        .with_timeout_ms(DYNAMIC_TIMEOUT_MS)
        .with_post_condition(PostCondition::ElementExists {
            selector: ".thank-you-message".to_string(),
        })
}

/// The journey prefix shared by every payment variant: service, date,
/// time slot, and contact details.
#[must_use]
pub fn reach_payment(service: &str, name: &str, email: &str, phone: &str) -> Flow {
    Flow::new("reach-payment")
        .step(select_service(service))
        .step(pick_next_available_date())
        .step(pick_first_time_slot())
        .step(fill_contact(name, email, phone))
}

/// A complete booking flow for one payment method
#[must_use]
pub fn booking_flow(method: &str) -> Flow {
    reach_payment("90min", "Jane Doe", "jane@x.com", "9405551234").extended(
        format!("booking-{method}"),
        vec![select_payment(method), confirm()],
    )
}

/// Names of the flows built into the harness
#[must_use]
pub fn builtin_flow_names() -> Vec<&'static str> {
    vec!["booking-cash", "booking-credit-card"]
}

/// Look up a built-in flow by name
#[must_use]
pub fn builtin_flow(name: &str) -> Option<Flow> {
    match name {
        "booking-cash" => Some(booking_flow("cash")),
        "booking-credit-card" => {
            let flow = booking_flow("credit_card");
            // Keep the public name aligned with the CLI listing
            Some(Flow::with_steps("booking-credit-card", flow.steps().to_vec()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepAction;

    #[test]
    fn booking_flow_has_the_full_journey() {
        let flow = booking_flow("cash");
        assert_eq!(flow.name(), "booking-cash");
        assert_eq!(flow.len(), 6);
        let names: Vec<_> = flow.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "select-service",
                "pick-next-available-date",
                "pick-first-time-slot",
                "fill-contact",
                "select-payment",
                "confirm"
            ]
        );
        assert!(flow.validate().is_ok());
    }

    #[test]
    fn payment_variants_share_the_prefix() {
        let cash = booking_flow("cash");
        let card = booking_flow("credit_card");
        assert_eq!(cash.steps()[..4], card.steps()[..4]);
        assert_ne!(cash.steps()[4], card.steps()[4]);
    }

    #[test]
    fn confirm_asserts_the_thank_you_node() {
        let step = confirm();
        assert_eq!(
            step.post_condition,
            Some(PostCondition::ElementExists {
                selector: ".thank-you-message".to_string()
            })
        );
    }

    #[test]
    fn fill_contact_is_one_evaluate_step() {
        let step = fill_contact("Jane Doe", "jane@x.com", "9405551234");
        assert_eq!(step.action, StepAction::Evaluate);
        let script = step.value.unwrap();
        assert!(script.contains("\"Jane Doe\""));
        assert!(script.contains("#contact-email"));
    }

    #[test]
    fn fill_contact_escapes_quotes() {
        let step = fill_contact("Jane \"JD\" Doe", "jane@x.com", "940");
        assert!(step.value.unwrap().contains("\\\"JD\\\""));
    }

    #[test]
    fn builtins_resolve_and_validate() {
        for name in builtin_flow_names() {
            let flow = builtin_flow(name).unwrap();
            assert_eq!(flow.name(), name);
            assert!(flow.validate().is_ok());
        }
        assert!(builtin_flow("nonsense").is_none());
    }

    #[test]
    fn dynamic_steps_carry_retry_budgets() {
        assert_eq!(pick_first_time_slot().retries, DYNAMIC_RETRIES);
        assert_eq!(pick_first_time_slot().timeout_ms, DYNAMIC_TIMEOUT_MS);
        assert_eq!(select_service("90min").max_attempts(), 3);
    }
}
