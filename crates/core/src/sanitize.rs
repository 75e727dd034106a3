pub fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .filter(|ch| is_allowed_char(*ch))
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_allowed_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ' ')
}
