use crate::models::ClassificationResult;

pub const OTHER_DOMAIN: &str = "Other";

/// Phrases that resolve a topic outright, checked in order before any keyword scoring.
const SPECIAL_CASES: &[(&str, &str)] = &[
    ("elon musk", "Business Leaders"),
    ("steve jobs", "Business Leaders"),
    ("bill gates", "Business Leaders"),
    ("mark zuckerberg", "Business Leaders"),
    ("jeff bezos", "Business Leaders"),
    ("sundar pichai", "Business Leaders"),
    ("satya nadella", "Business Leaders"),
    ("tim cook", "Business Leaders"),
    ("jensen huang", "Business Leaders"),
    ("sam altman", "Business Leaders"),
    ("trump", "Politics"),
    ("biden", "Politics"),
    ("musk", "Business Leaders"),
];

// Order matters: ties on confidence go to the earlier domain.
const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Technology",
        &[
            "ai", "artificial intelligence", "machine learning", "python", "javascript",
            "software", "app", "mobile", "web", "cloud", "aws", "azure", "google cloud",
            "api", "database", "server", "coding", "programming", "tech", "startup",
            "bitcoin", "ethereum", "crypto", "blockchain", "nft", "web3", "metaverse",
            "openai", "chatgpt", "copilot", "llm", "neural network", "gpu", "cpu",
            "apple", "microsoft", "google", "amazon", "meta", "nvidia", "tesla",
        ],
    ),
    (
        "Entertainment",
        &[
            "movie", "film", "show", "series", "tv", "netflix", "disney", "hollywood",
            "actor", "actress", "celebrity", "music", "song", "album", "concert",
            "gaming", "game", "esports", "twitch", "youtube", "streaming", "anime",
            "oscar", "grammy", "award", "award show", "box office", "premiere",
            "marvel", "star wars", "dc", "superhero",
        ],
    ),
    (
        "Sports",
        &[
            "football", "soccer", "basketball", "tennis", "cricket", "baseball",
            "nba", "nfl", "premier league", "champion", "olympics", "world cup",
            "nhl", "mls", "championship", "playoff", "match", "game", "player",
            "coach", "team", "tournament", "super bowl", "world series",
        ],
    ),
    (
        "Business & Finance",
        &[
            "stock", "market", "finance", "banking", "investment", "startup", "ipo",
            "earnings", "revenue", "profit", "economic", "inflation", "recession",
            "dollar", "currency", "trading", "forex", "crypto", "company", "ceo",
            "merger", "acquisition", "bankruptcy", "lawsuit", "lawsuit settlement",
        ],
    ),
    (
        "Politics",
        &[
            "election", "vote", "politician", "president", "congress", "senate",
            "parliament", "government", "policy", "bill", "law", "regulation",
            "trump", "biden", "democrat", "republican", "party", "campaign",
            "primary", "debate", "impeachment", "scandal",
        ],
    ),
    (
        "Health & Science",
        &[
            "health", "medical", "doctor", "hospital", "disease", "virus", "covid",
            "vaccine", "drug", "pharmaceutical", "research", "study", "scientist",
            "nasa", "space", "biology", "chemistry", "physics", "discovery",
            "breakthrough", "cancer", "mental health", "fitness", "nutrition",
        ],
    ),
    (
        "Business Leaders",
        &[
            "elon musk", "steve jobs", "bill gates", "mark zuckerberg", "jeff bezos",
            "sundar pichai", "satya nadella", "tim cook", "jensen huang", "sam altman",
            "jack dorsey", "parag agrawal", "sheryl sandberg",
        ],
    ),
    (
        "Science & Innovation",
        &[
            "innovation", "invention", "patent", "research", "laboratory", "experiment",
            "breakthrough", "discovery", "science", "technology", "ai", "quantum",
            "renewable energy", "solar", "wind", "electric vehicle", "battery",
        ],
    ),
    (
        "Lifestyle",
        &[
            "fashion", "style", "beauty", "luxury", "designer", "brand", "lifestyle",
            "travel", "vacation", "restaurant", "food", "cooking", "recipe",
            "wedding", "engagement", "baby", "home", "furniture", "design",
        ],
    ),
];

pub fn keyword_confidence(matches: usize) -> f64 {
    if matches == 0 {
        return 0.0;
    }
    (matches as f64 * 0.3 + 0.1).min(1.0)
}

pub fn classify(topic: &str) -> ClassificationResult {
    let normalized = topic.trim().to_lowercase();

    if let Some((_, domain)) = SPECIAL_CASES
        .iter()
        .find(|(phrase, _)| normalized.contains(phrase))
    {
        return ClassificationResult {
            domain: (*domain).to_string(),
            confidence: 1.0,
        };
    }

    let mut best: Option<(&str, f64)> = None;
    for (domain, keywords) in DOMAIN_KEYWORDS {
        let matches = keywords
            .iter()
            .filter(|keyword| normalized.contains(*keyword))
            .count();
        if matches == 0 {
            continue;
        }

        let confidence = keyword_confidence(matches);
        if best.map_or(true, |(_, current)| confidence > current) {
            best = Some((domain, confidence));
        }
    }

    match best {
        Some((domain, confidence)) => ClassificationResult {
            domain: domain.to_string(),
            confidence,
        },
        None => ClassificationResult {
            domain: OTHER_DOMAIN.to_string(),
            confidence: 0.0,
        },
    }
}

/// Classifies each distinct topic once, keeping the order topics first appear in.
pub fn classify_batch<S: AsRef<str>>(topics: &[S]) -> Vec<(String, ClassificationResult)> {
    let mut results: Vec<(String, ClassificationResult)> = Vec::with_capacity(topics.len());
    for topic in topics {
        let topic = topic.as_ref();
        if results.iter().any(|(seen, _)| seen == topic) {
            continue;
        }
        results.push((topic.to_string(), classify(topic)));
    }
    results
}

/// Counts topics per domain, largest first. Ties keep first-seen order.
pub fn domain_distribution<S: AsRef<str>>(topics: &[S]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for topic in topics {
        let result = classify(topic.as_ref());
        match counts.iter_mut().find(|(domain, _)| *domain == result.domain) {
            Some(entry) => entry.1 += 1,
            None => counts.push((result.domain, 1)),
        }
    }

    // sort_by is stable, so equal counts stay in first-seen order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn all_domains() -> Vec<String> {
    let mut domains: Vec<String> = DOMAIN_KEYWORDS
        .iter()
        .map(|(domain, _)| domain.to_string())
        .collect();
    domains.push(OTHER_DOMAIN.to_string());
    domains.sort();
    domains
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_case_wins_over_keywords() {
        let result = classify("Elon Musk acquires Twitter");
        assert_eq!(result.domain, "Business Leaders");
        assert_eq!(result.confidence, 1.0);

        let result = classify("Trump stock market election debate");
        assert_eq!(result.domain, "Politics");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn case_and_whitespace_do_not_matter() {
        let a = classify("  WORLD CUP Final  ");
        let b = classify("world cup final");
        assert_eq!(a, b);
        assert_eq!(a, classify("world cup final"));
        assert_eq!(a.domain, "Sports");
    }

    #[test]
    fn single_keyword_yields_point_four() {
        let result = classify("Solar");
        assert_eq!(result.domain, "Science & Innovation");
        assert!((result.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn confidence_saturates_at_one() {
        assert!((keyword_confidence(3) - 1.0).abs() < 1e-9);
        assert_eq!(keyword_confidence(4), 1.0);
        assert_eq!(keyword_confidence(12), 1.0);

        let result = classify("netflix movie premiere concert album");
        assert_eq!(result.domain, "Entertainment");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn ties_keep_table_order() {
        // "game" is listed under Entertainment and Sports; Entertainment comes first.
        let result = classify("game");
        assert_eq!(result.domain, "Entertainment");
        assert!((result.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn unmatched_topic_is_other() {
        let result = classify("zzz qqq");
        assert_eq!(result.domain, OTHER_DOMAIN);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(classify("   ").domain, OTHER_DOMAIN);
    }

    #[test]
    fn batch_keeps_first_occurrence() {
        let topics = ["Stock Market Crash", "COVID-19 Vaccine", "Stock Market Crash"];
        let results = classify_batch(&topics);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "Stock Market Crash");
        assert_eq!(results[0].1.domain, "Business & Finance");
        assert_eq!(results[1].1.domain, "Health & Science");
    }

    #[test]
    fn distribution_sums_and_sorts() {
        let topics = [
            "zzz",
            "NBA playoff",
            "Biden speech",
            "tennis",
            "qqq",
            "cricket",
        ];
        let distribution = domain_distribution(&topics);
        let total: usize = distribution.iter().map(|(_, count)| count).sum();
        assert_eq!(total, topics.len());
        assert_eq!(distribution[0], ("Sports".to_string(), 3));
        assert_eq!(distribution[1], ("Other".to_string(), 2));
        assert_eq!(distribution[2], ("Politics".to_string(), 1));
    }

    #[test]
    fn distribution_ties_keep_first_seen_order() {
        let topics = ["Biden", "zzz", "tennis"];
        let distribution = domain_distribution(&topics);
        let labels: Vec<&str> = distribution.iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(labels, vec!["Politics", "Other", "Sports"]);
    }

    #[test]
    fn all_domains_includes_other() {
        let domains = all_domains();
        assert_eq!(domains.len(), DOMAIN_KEYWORDS.len() + 1);
        assert!(domains.contains(&OTHER_DOMAIN.to_string()));
        assert!(domains.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
