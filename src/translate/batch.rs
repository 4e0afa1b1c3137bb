//! Concurrent, order-preserving translation of many paragraph blobs.
use crate::common::{excerpt, is_meaningful_text};
use crate::translate::error::TranslateError;
use crate::translate::guard::{clean_response, echoes_instructions, is_refusal};
use crate::translate::translator::{TranslationUnit, Translator};
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Default number of concurrent translation calls.
pub const DEFAULT_CONCURRENCY: usize = 8;
/// Default number of retries after a failed attempt.
pub const DEFAULT_MAX_RETRIES: usize = 2;

/// Settings for [`translate_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Worker threads, at least one
    pub concurrency: usize,
    /// Extra attempts per unit after the first one fails
    pub max_retries: usize,
    /// Prompt fragments whose presence in a response means the translator
    /// echoed its instructions
    pub instruction_markers: Vec<String>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            instruction_markers: Vec::new(),
        }
    }
}

/// How a unit ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// The translator's response passed every check
    Translated,
    /// Nothing worth translating; the blob was not sent
    Skipped,
    /// Every attempt broke the token protocol; the last response is passed
    /// on for best-effort alignment
    ProtocolViolation,
    /// Every attempt failed; the original blob is used
    Failed(TranslateError),
}

/// Result of one unit of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Text to reconstruct from; the original blob after a failure
    pub text: String,
    /// How `text` was obtained
    pub status: UnitStatus,
    /// Translator calls made
    pub attempts: usize,
}

impl BatchOutcome {
    /// Whether `text` is the original blob because translation failed.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self.status, UnitStatus::Failed(_))
    }
}

/// Translate `units` on a pool of `options.concurrency` threads.
///
/// The result has one outcome per unit, in input order, whatever order the
/// calls complete in. No unit's failure affects another: errors, panics,
/// empty replies and refusals are retried and finally resolve to the
/// original text.
pub fn translate_batch<T>(translator: &T, units: &[TranslationUnit], options: &BatchOptions) -> Vec<BatchOutcome>
where
    T: Translator + ?Sized,
{
    if units.is_empty() {
        return Vec::new();
    }
    let threads = options.concurrency.max(1);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("pomelo-translate-{}", i))
        .build();
    let outcomes: Vec<BatchOutcome> = match pool {
        Ok(pool) => pool.install(|| {
            units
                .par_iter()
                .map(|unit| translate_unit(translator, unit, options))
                .collect()
        }),
        Err(err) => {
            let err = TranslateError::Pool(err.to_string());
            tracing::warn!(error = %err, "translating sequentially");
            units
                .iter()
                .map(|unit| translate_unit(translator, unit, options))
                .collect()
        },
    };

    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    tracing::info!(
        target: "pomelo::audit",
        units = units.len(),
        failed,
        threads,
        "batch translated"
    );
    outcomes
}

/// Run every attempt for one unit.
pub fn translate_unit<T>(translator: &T, unit: &TranslationUnit, options: &BatchOptions) -> BatchOutcome
where
    T: Translator + ?Sized,
{
    if !is_meaningful_text(&unit.text) {
        return BatchOutcome {
            text: unit.text.clone(),
            status: UnitStatus::Skipped,
            attempts: 0,
        };
    }

    let budget = options.max_retries + 1;
    let mut last_error = TranslateError::Empty;
    let mut violating: Option<String> = None;

    for attempt in 1..=budget {
        match attempt_once(translator, unit, options) {
            Ok(text) => {
                tracing::info!(
                    target: "pomelo::audit",
                    part = %unit.context.part,
                    paragraph = unit.context.paragraph,
                    original = %excerpt(&unit.text, 50),
                    translated = %excerpt(&text, 50),
                    "translated"
                );
                return BatchOutcome {
                    text,
                    status: UnitStatus::Translated,
                    attempts: attempt,
                };
            },
            Err((err, response)) => {
                tracing::warn!(
                    target: "pomelo::audit",
                    part = %unit.context.part,
                    paragraph = unit.context.paragraph,
                    attempt,
                    budget,
                    error = %err,
                    "translation attempt rejected"
                );
                if let Some(response) = response {
                    violating = Some(response);
                }
                if !err.is_retryable() {
                    last_error = err;
                    break;
                }
                last_error = err;
            },
        }
    }

    if let Some(text) = violating {
        return BatchOutcome {
            text,
            status: UnitStatus::ProtocolViolation,
            attempts: budget,
        };
    }
    tracing::error!(
        target: "pomelo::audit",
        part = %unit.context.part,
        paragraph = unit.context.paragraph,
        error = %last_error,
        original = %excerpt(&unit.text, 80),
        "translation failed, original kept"
    );
    BatchOutcome {
        text: unit.text.clone(),
        status: UnitStatus::Failed(last_error),
        attempts: budget,
    }
}

/// One call plus response checks. A protocol violation carries the cleaned
/// response so it can still be aligned after the last attempt.
fn attempt_once<T>(
    translator: &T,
    unit: &TranslationUnit,
    options: &BatchOptions,
) -> Result<String, (TranslateError, Option<String>)>
where
    T: Translator + ?Sized,
{
    let raw = match catch_unwind(AssertUnwindSafe(|| translator.translate(unit))) {
        Ok(Ok(raw)) => raw,
        Ok(Err(err)) => return Err((err, None)),
        Err(payload) => return Err((TranslateError::Panicked(panic_message(payload.as_ref())), None)),
    };

    let text = clean_response(&unit.text, &raw);
    if text.trim().is_empty() {
        return Err((TranslateError::Empty, None));
    }
    if is_refusal(&unit.text, &text) {
        return Err((TranslateError::Refused(excerpt(&text, 50)), None));
    }
    if echoes_instructions(&text, &options.instruction_markers) {
        return Err((TranslateError::Protocol("response repeats the instructions".into()), None));
    }

    let tokens = &unit.context.tokens;
    let separators = tokens.count_separators(&text);
    let placeholders = tokens.count_placeholders(&text);
    let expected_separators = unit.context.expected_separators();
    if separators != expected_separators || placeholders != unit.context.placeholders {
        let err = TranslateError::Protocol(format!(
            "expected {} separators and {} placeholders, found {} and {}",
            expected_separators, unit.context.placeholders, separators, placeholders
        ));
        return Err((err, Some(text)));
    }
    Ok(text)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::error::Result;
    use crate::translate::protocol::Tokens;
    use crate::translate::translator::UnitContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn unit(text: &str, segments: usize, placeholders: usize) -> TranslationUnit {
        TranslationUnit::new(text).with_context(UnitContext {
            segments,
            placeholders,
            tokens: Tokens::default(),
            ..UnitContext::default()
        })
    }

    #[test]
    fn test_order_is_preserved() {
        let units: Vec<_> = (0..40).map(|i| unit(&format!("p{}", i), 1, 0)).collect();
        let translator = |u: &TranslationUnit| -> Result<String> {
            let n: u64 = u.text[1..].parse().unwrap_or(0);
            std::thread::sleep(std::time::Duration::from_millis((40 - n) % 7));
            Ok(u.text.to_uppercase())
        };
        let options = BatchOptions {
            concurrency: 4,
            ..Default::default()
        };
        let out = translate_batch(&translator, &units, &options);
        assert_eq!(out.len(), 40);
        for (i, o) in out.iter().enumerate() {
            assert_eq!(o.text, format!("P{}", i));
            assert_eq!(o.status, UnitStatus::Translated);
        }
    }

    #[test]
    fn test_one_failure_does_not_abort_the_batch() {
        let units = vec![unit("good", 1, 0), unit("bad", 1, 0), unit("boom", 1, 0), unit("also good", 1, 0)];
        let translator = |u: &TranslationUnit| -> Result<String> {
            match u.text.as_str() {
                "bad" => Err(TranslateError::Failed("timeout".into())),
                "boom" => panic!("translator crashed"),
                other => Ok(format!("[{}]", other)),
            }
        };
        let out = translate_batch(&translator, &units, &BatchOptions::default());
        assert_eq!(out[0].text, "[good]");
        assert_eq!(out[1].text, "bad");
        assert!(out[1].is_failure());
        assert_eq!(out[1].attempts, DEFAULT_MAX_RETRIES + 1);
        assert_eq!(out[2].text, "boom");
        assert!(matches!(out[2].status, UnitStatus::Failed(TranslateError::Panicked(_))));
        assert_eq!(out[3].text, "[also good]");
    }

    #[test]
    fn test_retry_recovers_from_transient_errors() {
        let calls = AtomicUsize::new(0);
        let translator = |_: &TranslationUnit| -> Result<String> {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(String::new()),
                1 => Ok("Sorry, I can't.".into()),
                _ => Ok("Bonjour".into()),
            }
        };
        let out = translate_unit(&translator, &unit("Hello", 1, 0), &BatchOptions::default());
        assert_eq!(out.text, "Bonjour");
        assert_eq!(out.attempts, 3);
    }

    #[test]
    fn test_protocol_violation_is_passed_on_after_budget() {
        let translator = |_: &TranslationUnit| -> Result<String> { Ok("Un Deux".into()) };
        let options = BatchOptions {
            max_retries: 1,
            ..Default::default()
        };
        let out = translate_unit(&translator, &unit("One【SEG】Two", 2, 0), &options);
        assert_eq!(out.status, UnitStatus::ProtocolViolation);
        assert_eq!(out.text, "Un Deux");
        assert_eq!(out.attempts, 2);
    }

    #[test]
    fn test_instruction_echo_is_retried() {
        let calls = AtomicUsize::new(0);
        let translator = |_: &TranslationUnit| -> Result<String> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok("CRITICAL RULES: do not translate".into())
            } else {
                Ok("Bonjour".into())
            }
        };
        let options = BatchOptions {
            instruction_markers: vec!["CRITICAL RULES".into()],
            ..Default::default()
        };
        let out = translate_unit(&translator, &unit("Hello", 1, 0), &options);
        assert_eq!(out.text, "Bonjour");
        assert_eq!(out.attempts, 2);
    }

    #[test]
    fn test_unmeaningful_units_are_not_sent() {
        let translator = |_: &TranslationUnit| -> Result<String> { panic!("must not be called") };
        let out = translate_batch(&translator, &[unit(" – ", 1, 0)], &BatchOptions::default());
        assert_eq!(out[0].status, UnitStatus::Skipped);
        assert_eq!(out[0].text, " – ");
    }
}
