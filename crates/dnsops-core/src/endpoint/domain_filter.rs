//! Inclusion/exclusion of DNS names by literal suffix or regex.

use regex::Regex;
use std::fmt;

/// Limits the DNS names DNSOps considers, either by literal domain
/// suffixes with optional exclusions, or by a regex pair (the regex form
/// overrides the literal form when both are configured).
#[derive(Debug, Clone)]
pub enum DomainFilter {
    /// Literal suffix matching: a name matches when it equals a filter or
    /// ends in `.<filter>`, and matches no exclusion the same way.
    Suffix {
        include: Vec<String>,
        exclude: Vec<String>,
    },
    /// Regex matching: a name matches the inclusion regex and, when an
    /// exclusion regex is set, does not match it.
    Regex {
        include: Regex,
        exclude: Option<Regex>,
    },
}

impl DomainFilter {
    /// A filter over literal domain suffixes without exclusions.
    pub fn new(include: Vec<String>) -> Self {
        Self::with_exclusions(include, Vec::new())
    }

    /// A filter over literal domain suffixes with exclusions.
    pub fn with_exclusions(include: Vec<String>, exclude: Vec<String>) -> Self {
        DomainFilter::Suffix {
            include: prepare_filters(include),
            exclude: prepare_filters(exclude),
        }
    }

    /// A regex filter. An empty exclusion pattern means "exclude nothing".
    pub fn regex(include: Regex, exclude: Option<Regex>) -> Self {
        DomainFilter::Regex {
            include,
            exclude: exclude.filter(|re| !re.as_str().is_empty()),
        }
    }

    /// Whether a domain passes the filter. The empty filter matches
    /// everything.
    pub fn matches(&self, domain: &str) -> bool {
        match self {
            DomainFilter::Suffix { include, exclude } => {
                match_suffix_filter(include, domain, true)
                    && !match_suffix_filter(exclude, domain, false)
            }
            DomainFilter::Regex { include, exclude } => {
                let domain = domain.trim_end_matches('.').to_lowercase();
                include.is_match(&domain)
                    && !exclude.as_ref().is_some_and(|re| re.is_match(&domain))
            }
        }
    }

    /// Whether the filter restricts anything at all.
    pub fn is_configured(&self) -> bool {
        match self {
            DomainFilter::Suffix { include, exclude } => {
                !include.is_empty() || !exclude.is_empty()
            }
            DomainFilter::Regex { include, .. } => !include.as_str().is_empty(),
        }
    }
}

impl Default for DomainFilter {
    fn default() -> Self {
        DomainFilter::new(Vec::new())
    }
}

impl fmt::Display for DomainFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainFilter::Suffix { include, exclude } => {
                write!(f, "suffix filter [{}] - [{}]", include.join(","), exclude.join(","))
            }
            DomainFilter::Regex { include, exclude } => write!(
                f,
                "regex filter /{}/ - /{}/",
                include,
                exclude.as_ref().map(|re| re.as_str()).unwrap_or_default()
            ),
        }
    }
}

fn prepare_filters(filters: Vec<String>) -> Vec<String> {
    filters
        .into_iter()
        .map(|f| f.trim().trim_end_matches('.').to_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
}

fn match_suffix_filter(filters: &[String], domain: &str, empty_value: bool) -> bool {
    if filters.is_empty() {
        return empty_value;
    }
    let domain = domain.trim_end_matches('.').to_lowercase();
    filters.iter().any(|filter| {
        if let Some(filter) = filter.strip_prefix('.') {
            domain.ends_with(&format!(".{filter}"))
        } else {
            domain == *filter || domain.ends_with(&format!(".{filter}"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        let filter = DomainFilter::default();
        assert!(filter.matches("example.com"));
        assert!(filter.matches("anything.at.all"));
        assert!(!filter.is_configured());
    }

    #[test]
    fn suffix_filter_matches_domain_and_subdomains() {
        let filter = DomainFilter::new(vec!["example.com".to_string()]);
        assert!(filter.matches("example.com"));
        assert!(filter.matches("svc.example.com"));
        assert!(filter.matches("Svc.Example.COM."));
        assert!(!filter.matches("example.org"));
        assert!(!filter.matches("notexample.com"));
    }

    #[test]
    fn leading_dot_filter_excludes_the_apex() {
        let filter = DomainFilter::new(vec![".example.com".to_string()]);
        assert!(filter.matches("svc.example.com"));
        assert!(!filter.matches("example.com"));
    }

    #[test]
    fn exclusions_take_domains_away() {
        let filter = DomainFilter::with_exclusions(
            vec!["example.com".to_string()],
            vec!["internal.example.com".to_string()],
        );
        assert!(filter.matches("svc.example.com"));
        assert!(!filter.matches("db.internal.example.com"));
        assert!(!filter.matches("internal.example.com"));
    }

    #[test]
    fn regex_filter_with_exclusion() {
        let filter = DomainFilter::regex(
            Regex::new(r"\.example\.com$").unwrap(),
            Some(Regex::new(r"^internal\.").unwrap()),
        );
        assert!(filter.matches("svc.example.com"));
        assert!(!filter.matches("internal.example.com"));
        assert!(!filter.matches("example.org"));
    }
}
