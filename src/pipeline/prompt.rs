use super::types::Requirement;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a construction specifications analyst. Your ONLY role is to pull
enforceable requirements out of specification text.

RULES:
1. Extract ONLY statements that impose an obligation (shall, must, provide, submit, comply).
2. Copy each requirement verbatim or near-verbatim. Do not paraphrase values, units, or standards.
3. One requirement per array element. Do not merge unrelated obligations.
4. Do not add commentary, headings, or explanations.

OUTPUT FORMAT:
Return ONLY a JSON array of strings. No prose before or after it.
"#;

pub const BULLET_SYSTEM_PROMPT: &str = "You are a concise summarizer.";

pub const COMPARE_SYSTEM_PROMPT: &str = r#"
You are a construction specifications expert reviewing a SUBMITTAL against
specification REQUIREMENTS.

For each requirement, state what the submittal actually provides and whether
it complies. Judge only from the submittal text. If the submittal is silent on
a requirement, it does not comply and "provided" is an empty string.

OUTPUT FORMAT:
Return ONLY a JSON array with exactly one object per requirement, in the same
order as the requirements were given:
[{"requirement": "...", "provided": "...", "compliant": true, "comment": "..."}]
"#;

pub const SUMMARY_SYSTEM_PROMPT: &str = r#"
You are a construction submittal reviewer. Write a one to two sentence
narrative summary of a compliance review for the project team. Plain prose
only. No tables, lists, or JSON.
"#;

/// Prompt asking for verbatim requirements from the whole spec, or from one chunk of it.
pub fn build_extraction_prompt(spec_text: &str, chunk: Option<(usize, usize)>) -> String {
    let scope = match chunk {
        Some((index, total)) => format!(
            "The text below is part {index} of {total} of a specification. \
             Extract the requirements that appear in this part only.\n"
        ),
        None => String::new(),
    };
    format!(
        "{scope}\n<specification>\n{spec_text}\n</specification>\n\n\
         Return a JSON array of every enforceable requirement above, as strings, \
         in the order they appear."
    )
}

/// Prompt for the per-chunk bullet summary (bullet-distill strategy).
pub fn build_bullet_prompt(chunk_text: &str, index: usize) -> String {
    format!("Chunk {index}: Summarize into 5-8 bullets of enforceable requirements.\n\n```{chunk_text}```")
}

/// Prompt for distilling concatenated chunk bullets into `target` bullets.
pub fn build_distill_prompt(merged_bullets: &str, target: usize) -> String {
    format!(
        "Distill these bullets into {target} concise bullets, one requirement per bullet, \
         each line starting with \"- \":\n\n```{merged_bullets}```"
    )
}

/// Prompt for judging one batch of requirements against the submittal.
pub fn build_compare_prompt(batch: &[Requirement], submittal_text: &str) -> String {
    let listed = batch
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "REQUIREMENTS ({count}):\n{listed}\n\n\
         <submittal>\n{submittal_text}\n</submittal>\n\n\
         Return a JSON array of exactly {count} verdict objects, one per requirement, in order.",
        count = batch.len()
    )
}

/// Prompt for the narrative summary. `tally` is the locally computed count line.
pub fn build_summary_prompt(tally: &str, non_compliant: &[&str]) -> String {
    let gaps = if non_compliant.is_empty() {
        "None.".to_string()
    } else {
        non_compliant
            .iter()
            .map(|r| format!("- {r}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("Review result: {tally}\n\nNon-compliant requirements:\n{gaps}\n\nWrite the summary.")
}
