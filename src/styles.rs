#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleEntry {
    pub id: &'static str,
    pub prompt: &'static str,
}

impl StyleEntry {
    pub const fn new(id: &'static str, prompt: &'static str) -> Self {
        Self { id, prompt }
    }
}

/// 六种写真风格，顺序即结果网格的展示顺序。
pub const STYLE_CATALOG: &[StyleEntry] = &[
    StyleEntry::new(
        "1_职业肖像",
        "Professional LinkedIn headshot, business attire, confident smile, studio lighting, neutral grey background, high quality, 8k.",
    ),
    StyleEntry::new(
        "2_时尚写真",
        "High fashion photography, vogue magazine style, trendy outfit, dynamic pose, dramatic studio lighting.",
    ),
    StyleEntry::new(
        "3_美术馆迷失",
        "Candid shot standing in a modern art gallery, looking at abstract painting, 'lost in art' vibe, soft ambient lighting.",
    ),
    StyleEntry::new(
        "4_黑白艺术",
        "Black and white fine art photography, high contrast, dramatic shadows, noir style, grainy texture, emotional gaze.",
    ),
    StyleEntry::new(
        "5_美式封面",
        "American magazine cover style, close-up portrait, bold colors, studio lighting, sharp details, commercial photography.",
    ),
    StyleEntry::new(
        "6_电影肖像",
        "Cinematic movie shot, anamorphic lens, shallow depth of field, Wong Kar-wai style, dramatic lighting.",
    ),
];

pub fn style_ids(catalog: &[StyleEntry]) -> Vec<&'static str> {
    catalog.iter().map(|style| style.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_six_unique_styles_in_order() {
        let ids = style_ids(STYLE_CATALOG);
        assert_eq!(ids.len(), 6);
        assert_eq!(ids.first(), Some(&"1_职业肖像"));
        assert_eq!(ids.last(), Some(&"6_电影肖像"));

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn every_style_has_a_prompt() {
        assert!(STYLE_CATALOG.iter().all(|style| !style.prompt.trim().is_empty()));
    }
}
