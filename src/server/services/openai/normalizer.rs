use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;

use crate::server::services::qa::types::QaAnswer;

pub const ANSWER_NOT_FOUND: &str = "No se encontró información en el contrato";
pub const ANSWER_PROCESSING_ERROR: &str = "Error en el procesamiento de la respuesta";

const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Reconciles parsed model output with the original question list into a
/// fixed-shape answer list: exactly one answer per question, in question
/// order, with fixed defaults for every missing or malformed slot.
///
/// This is the last line of defense before the caller: it must produce a
/// full-length answer list no matter what the model returned, so the body
/// runs under a panic guard and degrades to placeholder answers instead of
/// tearing down the request.
pub fn normalize_qa_responses(
    data: &Value,
    questions: &[String],
    include_reasoning: bool,
) -> Vec<QaAnswer> {
    catch_unwind(AssertUnwindSafe(|| {
        build_answers(data, questions, include_reasoning)
    }))
    .unwrap_or_else(|_| placeholder_answers(questions))
}

fn build_answers(data: &Value, questions: &[String], include_reasoning: bool) -> Vec<QaAnswer> {
    let results = data
        .get("qa_resultados")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let slot = results.get(index).filter(|value| value.is_object());

            let answer = slot
                .and_then(|value| value.get("respuesta"))
                .map(stringify)
                .unwrap_or_else(|| ANSWER_NOT_FOUND.to_string());

            let confidence = slot
                .and_then(|value| value.get("confianza"))
                .map(coerce_confidence)
                .unwrap_or(NEUTRAL_CONFIDENCE);

            let reasoning = if include_reasoning {
                slot.and_then(|value| value.get("razonamiento"))
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
                    .map(String::from)
            } else {
                None
            };

            QaAnswer {
                order: (index + 1) as u32,
                question: question.clone(),
                answer,
                confidence,
                reasoning,
            }
        })
        .collect()
}

/// Coerces a confidence value to f64 within [0,1]. Numeric strings are
/// accepted; anything non-numeric, out of range, or non-finite resets to the
/// neutral default.
fn coerce_confidence(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(confidence) if (0.0..=1.0).contains(&confidence) => confidence,
        _ => NEUTRAL_CONFIDENCE,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => ANSWER_NOT_FOUND.to_string(),
        other => other.to_string(),
    }
}

fn placeholder_answers(questions: &[String]) -> Vec<QaAnswer> {
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| QaAnswer {
            order: (index + 1) as u32,
            question: question.clone(),
            answer: ANSWER_PROCESSING_ERROR.to_string(),
            confidence: 0.0,
            reasoning: None,
        })
        .collect()
}
