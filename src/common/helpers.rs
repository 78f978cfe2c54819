// Helpers for log masking and input normalization

/// Masks an email address for logging, keeping the first character and the domain.
///
/// `"ann@example.com"` becomes `"a***@example.com"`.
pub fn safe_email_log(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        _ => "***@***.***".to_string(),
    }
}

/// Masks a bearer token for logging. Only the last 6 characters survive,
/// which sit inside the signature and identify the token without replaying it.
pub fn safe_token_log(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 12 {
        let tail: String = chars[chars.len() - 6..].iter().collect();
        format!("***{}", tail)
    } else {
        "***".to_string()
    }
}

/// Emails are unique case-insensitively, so every lookup and write goes through this.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
