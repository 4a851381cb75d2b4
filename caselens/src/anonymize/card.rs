use crate::models::Case;

fn fmt_opt_f64(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "unknown".to_string())
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("unknown")
}

/// Free-text summary of a case built only from retained technical fields.
/// Never mentions the diagnosis.
pub fn case_card_text(case: &Case) -> String {
    let t = &case.technical;
    let kind = if t.num_frames > 1 { "multiframe" } else { "single-frame" };
    let device = match (t.manufacturer.as_deref(), t.model.as_deref()) {
        (Some(m), Some(model)) => format!("{m} {model}"),
        (Some(m), None) => m.to_string(),
        (None, Some(model)) => model.to_string(),
        (None, None) => "unknown".to_string(),
    };

    let mut lines = vec![
        format!("Case ID: {}", case.case_id),
        format!("Modality: {} {kind} study.", t.modality_description()),
        format!("View: {}", or_unknown(t.view.as_deref())),
        format!("Stage: {}", or_unknown(t.stage.as_deref())),
        format!(
            "Frames: {}, FPS: {}, Duration: {} s",
            t.num_frames,
            fmt_opt_f64(t.fps, 1),
            fmt_opt_f64(t.duration_s, 2)
        ),
    ];
    if let Some(hr) = t.heart_rate {
        lines.push(format!("Heart rate: {hr:.0} bpm"));
    }
    if let (Some(rows), Some(cols)) = (t.rows, t.columns) {
        lines.push(format!("Matrix: {cols}x{rows}"));
    }
    lines.push(format!("Device: {device}"));
    lines.push("Findings: not provided (metadata-only).".to_string());
    lines.join("\n")
}

/// Caption for one persisted frame of a case.
pub fn frame_caption(case: &Case, ordinal: usize, total: usize) -> String {
    let t = &case.technical;
    format!(
        "Representative {} frame {ordinal} of {total} from case {}. View: {}. Stage: {}.",
        t.modality_description().to_lowercase(),
        case.case_id,
        or_unknown(t.view.as_deref()),
        or_unknown(t.stage.as_deref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabelInfo, TechnicalMetadata};

    fn case() -> Case {
        Case {
            case_id: "feedbeef0001".into(),
            label: Some(LabelInfo::unmapped("dilated_cardiomyopathy")),
            technical: TechnicalMetadata {
                modality: Some("US".into()),
                view: Some("PLAX".into()),
                num_frames: 60,
                fps: Some(30.0),
                duration_s: Some(2.0),
                heart_rate: Some(71.6),
                manufacturer: Some("Acme".into()),
                ..Default::default()
            },
            anonymized: true,
        }
    }

    #[test]
    fn test_card_lists_technical_fields() {
        let card = case_card_text(&case());
        assert!(card.starts_with("Case ID: feedbeef0001\n"));
        assert!(card.contains("Modality: Ultrasound multiframe study."));
        assert!(card.contains("Frames: 60, FPS: 30.0, Duration: 2.00 s"));
        assert!(card.contains("Heart rate: 72 bpm"));
        assert!(card.contains("Stage: unknown"));
        assert!(card.contains("Device: Acme"));
    }

    #[test]
    fn test_card_never_mentions_label() {
        let card = case_card_text(&case());
        assert!(!card.to_lowercase().contains("cardiomyopathy"));
    }

    #[test]
    fn test_frame_caption() {
        let caption = frame_caption(&case(), 2, 5);
        assert_eq!(
            caption,
            "Representative ultrasound frame 2 of 5 from case feedbeef0001. View: PLAX. Stage: unknown."
        );
    }
}
