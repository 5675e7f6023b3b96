pub fn format_strength(strength: f32) -> String {
    format!("{strength:.3}")
}

/// Shortens a label to at most `max_chars` characters, marking the cut with an ellipsis.
pub fn clip_label(label: &str, max_chars: usize) -> std::borrow::Cow<'_, str> {
    if label.chars().count() <= max_chars {
        return label.into();
    }

    let mut clipped = label
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    clipped.push('…');
    clipped.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_label_keeps_short_labels() {
        assert_eq!(clip_label("Document 1", 24), "Document 1");
        assert_eq!(clip_label("abcdefgh", 5), "abcd…");
    }
}
