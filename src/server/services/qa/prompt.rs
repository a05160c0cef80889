use std::{env, fs, path::Path};

use regex::Regex;

const CONTRACT_PLACEHOLDER: &str = "{texto_contrato}";
const QUESTIONS_PLACEHOLDER: &str = "{preguntas_formateadas}";

const DEFAULT_QA_PROMPT: &str = r#"Eres un experto en análisis de contratos y documentos legales.

TAREA: Analizar el contrato proporcionado y responder las preguntas específicas de manera precisa y estructurada.

INSTRUCCIONES:
1. Lee cuidadosamente todo el texto del contrato
2. Para cada pregunta, busca la información relevante en el contrato
3. Proporciona respuestas claras y específicas
4. Si no encuentras información, responde "No se encontró información en el contrato"
5. Incluye nivel de confianza (0.0 a 1.0) basado en la claridad de la información
6. Si se solicita razonamiento, explica brevemente dónde encontraste la información

FORMATO DE RESPUESTA:
- Responde ÚNICAMENTE con un JSON válido
- La estructura debe ser: {"qa_resultados": [{"pregunta_orden": 1, "pregunta": "...", "respuesta": "...", "confianza": 0.8, "razonamiento": "..."}]}
- Las respuestas deben mantener el mismo orden que las preguntas de entrada
- Usa confianza alta (0.8-1.0) para información explícita y clara
- Usa confianza media (0.5-0.7) para información inferida o parcial
- Usa confianza baja (0.1-0.4) para información incierta o ambigua

CONTRATO:
{texto_contrato}

PREGUNTAS:
{preguntas_formateadas}

RESPUESTA JSON:"#;

const INCLUDE_REASONING_INSTRUCTION: &str = "\n\nIMPORTANTE: Incluye el campo 'razonamiento' en cada respuesta explicando brevemente dónde encontraste la información.";
const OMIT_REASONING_INSTRUCTION: &str =
    "\n\nIMPORTANTE: NO incluyas el campo 'razonamiento' en las respuestas.";

/// Loads the prompt template. Search order: PROMPT_FILE env override, then
/// `qa_prompt.txt` in the working directory, then `prompts/qa_prompt.txt`,
/// then the built-in default. The template source is never mutated.
fn read_prompt_template() -> String {
    if let Ok(path) = env::var("PROMPT_FILE") {
        if let Ok(template) = fs::read_to_string(&path) {
            return template;
        }
    }
    for candidate in ["qa_prompt.txt", "prompts/qa_prompt.txt"] {
        if Path::new(candidate).is_file() {
            if let Ok(template) = fs::read_to_string(candidate) {
                return template;
            }
        }
    }
    DEFAULT_QA_PROMPT.to_string()
}

/// Splits an optional leading `[ID]` tag off a question. `"[P001] ¿...?"`
/// yields `(Some("P001"), "¿...?")`; untagged questions pass through intact.
pub fn extract_question_id(question: &str) -> (Option<String>, String) {
    let pattern = Regex::new(r"^\[([A-Za-z0-9_\-]+)\]\s*(.+)$").unwrap();
    let trimmed = question.trim();
    if let Some(captures) = pattern.captures(trimmed) {
        let id = captures[1].trim().to_string();
        let text = captures[2].trim().to_string();
        if !id.is_empty() && !text.is_empty() {
            return (Some(id), text);
        }
    }
    (None, trimmed.to_string())
}

/// Renders the 1-based numbered question list, preserving `[ID]` tags.
fn format_questions(questions: &[String]) -> String {
    let mut lines = Vec::with_capacity(questions.len());
    for (index, question) in questions.iter().enumerate() {
        let position = index + 1;
        match extract_question_id(question) {
            (Some(id), text) => lines.push(format!("{position}. [{id}] {text}")),
            (None, text) => lines.push(format!("{position}. {text}")),
        }
    }
    lines.join("\n")
}

/// Renders the full prompt: template with contract and question list
/// substituted, plus the reasoning instruction matching the flag. Only the
/// two placeholder tokens are replaced, so literal braces elsewhere in the
/// template are left alone.
pub fn format_qa_prompt(contract_text: &str, questions: &[String], include_reasoning: bool) -> String {
    let template = read_prompt_template();
    let rendered_questions = format_questions(questions);

    let mut prompt = template
        .replace(CONTRACT_PLACEHOLDER, contract_text)
        .replace(QUESTIONS_PLACEHOLDER, &rendered_questions);

    prompt.push_str(if include_reasoning {
        INCLUDE_REASONING_INSTRUCTION
    } else {
        OMIT_REASONING_INSTRUCTION
    });

    prompt
}
