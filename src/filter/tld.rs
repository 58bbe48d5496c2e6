//! Registrable ("top") domain derivation.

/// Two-label public suffixes that need three labels kept for the
/// registrable domain (e.g. `co.uk` so `example.co.uk` stays whole rather
/// than truncating to `co.uk`). Unknown suffixes fall back to "last two
/// labels".
const TWO_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "com.au", "co.jp", "co.kr", "co.nz", "co.za", "com.br", "com.cn", "com.mx", "com.tw",
    "org.uk", "net.au", "gov.uk",
];

/// Derive the registrable domain of a host, e.g. `www.example.co.uk` →
/// `example.co.uk`, `sub.example.com` → `example.com`.
pub fn registrable_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host.to_ascii_lowercase();
    }

    let last_two = labels[labels.len() - 2..].join(".").to_ascii_lowercase();
    if TWO_LABEL_SUFFIXES.contains(&last_two.as_str()) && labels.len() >= 3 {
        return labels[labels.len() - 3..].join(".").to_ascii_lowercase();
    }

    last_two
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_two_label_host_is_its_own_registrable_domain() {
        assert_eq!(registrable_domain("example.com"), "example.com");
    }

    #[test]
    fn subdomain_falls_back_to_last_two_labels() {
        assert_eq!(registrable_domain("www.example.com"), "example.com");
        assert_eq!(registrable_domain("a.b.c.example.com"), "example.com");
    }

    #[test]
    fn known_two_label_suffix_keeps_three_labels() {
        assert_eq!(registrable_domain("www.example.co.uk"), "example.co.uk");
        assert_eq!(registrable_domain("shop.example.com.au"), "example.com.au");
    }

    #[test]
    fn unknown_suffix_uses_last_two_labels_even_if_short() {
        assert_eq!(registrable_domain("a.b.xyz"), "b.xyz");
    }

    #[test]
    fn single_label_host_is_returned_as_is() {
        assert_eq!(registrable_domain("localhost"), "localhost");
    }
}
