use crate::models::CollectionItem;

/// Whether `item` matches `query`.
///
/// An empty (or all-whitespace) query matches everything. Otherwise the query
/// must be a case-insensitive substring of the title, description, developer
/// or one of the category labels.
pub fn matches_query(item: &CollectionItem, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

    contains(&item.title)
        || item.description.as_deref().is_some_and(contains)
        || item.developer.as_deref().is_some_and(contains)
        || item.categories.iter().any(|category| contains(category.label()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Exact,
    Prefix,
    Other,
}

fn tier(title: &str, needle: &str) -> Tier {
    if title == needle {
        Tier::Exact
    } else if title.starts_with(needle) {
        Tier::Prefix
    } else {
        Tier::Other
    }
}

/// Order `matches` for `query`: exact title first, then title prefix, then the rest.
///
/// Within each tier items sort by case-insensitive title, then by raw title,
/// then by id, so the order never depends on the input order. An empty query
/// leaves `matches` untouched.
pub fn rank_results<'a>(matches: Vec<&'a CollectionItem>, query: &str) -> Vec<&'a CollectionItem> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return matches;
    }

    let mut keyed: Vec<(Tier, String, &'a CollectionItem)> = matches
        .into_iter()
        .map(|item| {
            let folded = item.title.to_lowercase();
            (tier(&folded, &needle), folded, item)
        })
        .collect();
    keyed.sort_by(|(tier_a, folded_a, a), (tier_b, folded_b, b)| {
        tier_a
            .cmp(tier_b)
            .then_with(|| folded_a.cmp(folded_b))
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.id.cmp(&b.id))
    });
    keyed.into_iter().map(|(_, _, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ItemDraft, Platform};
    use chrono::Utc;

    fn item(title: &str) -> CollectionItem {
        CollectionItem::from_draft(
            ItemDraft::new(title, [Category::Action], [Platform::Pc]),
            Utc::now(),
        )
        .expect("valid draft")
    }

    fn titles<'a>(items: &[&'a CollectionItem]) -> Vec<&'a str> {
        items.iter().map(|item| item.title.as_str()).collect()
    }

    #[test]
    fn exact_then_prefix_then_substring() {
        let items = vec![
            item("Tsushima Ghost Story"),
            item("Ghostrunner"),
            item("Ghost of Tsushima"),
        ];
        let matches: Vec<_> = items.iter().filter(|i| matches_query(i, "Ghost")).collect();
        let ranked = rank_results(matches, "Ghost");
        assert_eq!(
            titles(&ranked),
            vec!["Ghost of Tsushima", "Ghostrunner", "Tsushima Ghost Story"]
        );
    }

    #[test]
    fn exact_title_beats_prefix() {
        let items = vec![item("Doom Eternal"), item("doom"), item("Doom 64")];
        let ranked = rank_results(items.iter().collect(), "DOOM");
        assert_eq!(titles(&ranked), vec!["doom", "Doom 64", "Doom Eternal"]);
    }

    #[test]
    fn ranking_ignores_input_order() {
        let items = vec![item("Celeste"), item("celeste"), item("Celeste Classic")];
        let forward = rank_results(items.iter().collect(), "cel");
        let backward = rank_results(items.iter().rev().collect(), "cel");
        let forward_ids: Vec<_> = forward.iter().map(|item| &item.id).collect();
        let backward_ids: Vec<_> = backward.iter().map(|item| &item.id).collect();
        assert_eq!(forward_ids, backward_ids);
        assert_eq!(titles(&forward)[..2], ["Celeste", "celeste"]);
    }

    #[test]
    fn matching_covers_description_developer_and_categories() {
        let mut hades = item("Hades");
        hades.developer = Some("Supergiant Games".into());
        hades.description = Some("Escape the underworld".into());
        hades.categories = vec![Category::Rpg];

        assert!(matches_query(&hades, ""));
        assert!(matches_query(&hades, "  "));
        assert!(matches_query(&hades, "supergiant"));
        assert!(matches_query(&hades, "UNDERWORLD"));
        assert!(matches_query(&hades, "rpg"));
        assert!(!matches_query(&hades, "action"));
    }

    #[test]
    fn empty_query_keeps_collection_order() {
        let items = vec![item("B"), item("A")];
        let ranked = rank_results(items.iter().collect(), "");
        assert_eq!(titles(&ranked), vec!["B", "A"]);
    }
}
