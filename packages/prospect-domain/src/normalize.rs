/// Normalise a website/domain string to a bare lowercase host.
///
/// Strips the scheme, a leading `www.`, any path/query suffix, and a port.
/// Returns `None` when nothing host-like remains.
pub fn normalize_domain(raw: &str) -> Option<String> {
	let trimmed = raw.trim().to_lowercase();
	let without_scheme = trimmed
		.strip_prefix("https://")
		.or_else(|| trimmed.strip_prefix("http://"))
		.unwrap_or(trimmed.as_str());
	let host = without_scheme
		.split(['/', '?', '#'])
		.next()
		.unwrap_or_default()
		.split(':')
		.next()
		.unwrap_or_default();
	let host = host.strip_prefix("www.").unwrap_or(host).trim_matches('.');

	if host.is_empty() || !host.contains('.') {
		return None;
	}

	Some(host.to_string())
}

/// Normalise a company name for exact-match comparison: lowercase, trimmed,
/// inner whitespace collapsed.
pub fn normalize_name(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_scheme_www_path_and_port() {
		assert_eq!(
			normalize_domain("https://www.PayFlow.io/about?ref=x"),
			Some("payflow.io".to_string())
		);
		assert_eq!(normalize_domain("http://acme.example.com:8443/"), Some("acme.example.com".to_string()));
	}

	#[test]
	fn rejects_hostless_input() {
		assert_eq!(normalize_domain("   "), None);
		assert_eq!(normalize_domain("https://"), None);
		assert_eq!(normalize_domain("localhost"), None);
	}

	#[test]
	fn name_normalisation_collapses_whitespace() {
		assert_eq!(normalize_name("  PayFlow   GmbH "), "payflow gmbh");
	}
}
