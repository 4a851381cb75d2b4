//! Prompt text for evidence-grounded case review.

use std::fmt::Write;

use crate::models::{LabelVote, RetrievalHit};

pub const SYSTEM_PROMPT: &str = r#"You are a cardiology clinical decision support assistant.

Goal:
- Suggest a PROBABLE DIAGNOSIS (not definitive) and a DIFFERENTIAL (2 alternatives)
based ONLY on:
1) the provided clinical report text,
2) the provided visual evidence (sampled frames),
3) retrieved similar cases,
4) retrieved guideline chunks (if provided).

Rules:
- Do NOT invent measurements, findings, or patient details.
- If evidence is insufficient, state it explicitly and list what is missing.
- Provide confidence: low / medium / high, with a short justification.
- Separate evidence from text vs evidence from images.
- For each key claim, cite either a CASE (case_id) or a GUIDELINE (source+chunk).
- Always include a Sources section:
  - list case_id(s) used
  - list guideline sources/chunks if present

Output format:
1) Suggested diagnosis (confidence)
2) Differential (2 alternatives) + why
3) Evidence (bullets)
   - From report/retrieved context
   - From images/frames
4) Missing info / recommended next checks
5) Sources
"#;

pub const NO_CASES: &str = "(no similar cases retrieved)";
pub const NO_GUIDELINES: &str = "(no guidelines retrieved)";

/// Builds the single text block handed to the reasoning model.
pub fn build_user_payload(
    report_text: &str,
    votes: &[LabelVote],
    cases: &[RetrievalHit],
    guidelines: &[RetrievalHit],
    missing_info: &[String],
) -> String {
    let diag_lines = votes
        .iter()
        .map(|vote| format!("- {}: score={:.3}", vote.label, vote.weight))
        .collect::<Vec<_>>()
        .join("\n");

    let mut cases_block = String::new();
    for hit in cases {
        let _ = write!(
            cases_block,
            "\n[CASE {} | label={} | dist={:.4}]\n{}\n",
            hit.case_id().unwrap_or(&hit.id),
            hit.label(),
            hit.distance,
            hit.text
        );
    }
    if cases_block.is_empty() {
        cases_block.push_str(NO_CASES);
    }

    let mut guides_block = String::new();
    for hit in guidelines {
        let chunk = hit
            .metadata
            .get("chunk_id")
            .map(|value| match value.as_str() {
                Some(text) => text.to_string(),
                None => value.to_string(),
            })
            .unwrap_or_else(|| "?".to_string());
        let _ = write!(
            guides_block,
            "\n[GUIDELINE {} chunk={} dist={:.4}]\n{}\n",
            hit.str_field("source").unwrap_or("unknown"),
            chunk,
            hit.distance,
            hit.text
        );
    }
    if guides_block.is_empty() {
        guides_block.push_str(NO_GUIDELINES);
    }

    let mut payload = format!(
        "CLINICAL REPORT:\n{report_text}\n\n\
         KNN DIAGNOSIS CANDIDATES (from similar retrieved cases):\n{diag_lines}\n\n\
         RETRIEVED SIMILAR CASES:\n{cases_block}\n\n\
         RETRIEVED GUIDELINES:\n{guides_block}\n"
    );

    if !missing_info.is_empty() {
        payload.push_str("\nEVIDENCE GAPS:\n");
        for note in missing_info {
            let _ = writeln!(payload, "- {note}");
        }
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(id: &str, distance: f32, metadata: serde_json::Value, text: &str) -> RetrievalHit {
        RetrievalHit {
            id: id.to_string(),
            distance,
            text: text.to_string(),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_payload_sections() {
        let votes = vec![LabelVote {
            label: "Normal".to_string(),
            weight: 1.25,
        }];
        let cases = vec![hit(
            "a1b2c3d4e5f6",
            0.1234,
            json!({"case_id": "a1b2c3d4e5f6", "diagnosis_label_raw": "Normal"}),
            "Case ID: a1b2c3d4e5f6",
        )];
        let guidelines = vec![hit(
            "esc.txt#2",
            0.5,
            json!({"source": "esc.txt", "chunk_id": 2}),
            "LVEF below 40%",
        )];

        let payload = build_user_payload("Dilated LV", &votes, &cases, &guidelines, &[]);

        assert!(payload.starts_with("CLINICAL REPORT:\nDilated LV\n"));
        assert!(payload.contains("- Normal: score=1.250"));
        assert!(payload.contains("[CASE a1b2c3d4e5f6 | label=Normal | dist=0.1234]"));
        assert!(payload.contains("[GUIDELINE esc.txt chunk=2 dist=0.5000]\nLVEF below 40%"));
        assert!(!payload.contains("EVIDENCE GAPS"));
    }

    #[test]
    fn test_payload_placeholders_and_gaps() {
        let votes = vec![LabelVote {
            label: "unknown".to_string(),
            weight: 0.0,
        }];
        let payload = build_user_payload(
            "report",
            &votes,
            &[],
            &[],
            &["No similar cases were retrieved.".to_string()],
        );

        assert!(payload.contains(NO_CASES));
        assert!(payload.contains(NO_GUIDELINES));
        assert!(payload.contains("- unknown: score=0.000"));
        assert!(payload.ends_with("EVIDENCE GAPS:\n- No similar cases were retrieved.\n"));
    }
}
