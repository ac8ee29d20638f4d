//! Client-side filter predicate.
//!
//! A toolkit is included iff it satisfies every active dimension; within a
//! multi-select dimension any selected value is enough. Unselected dimensions
//! are vacuously satisfied.

use crate::models::{FacetOption, Facets, FilterState, ToolkitRecord};
use std::collections::{BTreeMap, BTreeSet};

fn any_selected(selected: &BTreeSet<String>, values: &[String]) -> bool {
    selected.is_empty() || values.iter().any(|value| selected.contains(value))
}

fn slug_matches(selected: Option<&str>, actual: Option<&str>) -> bool {
    match selected {
        None => true,
        Some(selected) => actual == Some(selected),
    }
}

/// Case-insensitive substring match on name or description. Surrounding
/// whitespace is ignored; a blank term matches everything.
pub fn matches_search(record: &ToolkitRecord, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return true;
    }
    let term = term.to_lowercase();
    record.name.to_lowercase().contains(&term)
        || record
            .description
            .as_deref()
            .is_some_and(|description| description.to_lowercase().contains(&term))
}

/// Whether `record` passes `filters` and the committed `search_term`.
///
/// `filters.search_term()` (the raw input) is ignored: callers pass the
/// debounced term explicitly.
pub fn matches(record: &ToolkitRecord, filters: &FilterState, search_term: &str) -> bool {
    slug_matches(filters.category(), record.category_slug())
        && slug_matches(filters.subcategory(), record.subcategory_slug())
        && any_selected(filters.tech(), &record.tech)
        && any_selected(filters.languages(), &record.languages)
        && (filters.pricing().is_empty()
            || record
                .pricing
                .as_ref()
                .is_some_and(|pricing| filters.pricing().contains(pricing)))
        && matches_search(record, search_term)
}

/// Records passing [`matches`], in their original order.
pub fn apply(records: &[ToolkitRecord], filters: &FilterState, search_term: &str) -> Vec<ToolkitRecord> {
    records
        .iter()
        .filter(|record| matches(record, filters, search_term))
        .cloned()
        .collect()
}

fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Every value `records` offer for the subcategory, tech, language and
/// pricing dimensions. Subcategories are keyed by slug; the first name seen
/// for a slug wins and the slug stands in when no name is known.
pub fn facets(records: &[ToolkitRecord]) -> Facets {
    let mut subcategories: BTreeMap<&str, &str> = BTreeMap::new();
    let mut tech = BTreeSet::new();
    let mut languages = BTreeSet::new();
    let mut pricing = BTreeSet::new();

    for record in records {
        if let Some(sub) = &record.subcategory {
            if let Some(slug) = sub.slug.as_deref().and_then(non_blank) {
                let name = sub.name.as_deref().and_then(non_blank).unwrap_or(slug);
                subcategories.entry(slug).or_insert(name);
            }
        }
        tech.extend(record.tech.iter().filter_map(|value| non_blank(value)));
        languages.extend(record.languages.iter().filter_map(|value| non_blank(value)));
        pricing.extend(record.pricing.as_deref().and_then(non_blank));
    }

    Facets {
        subcategories: subcategories
            .into_iter()
            .map(|(slug, name)| FacetOption {
                slug: slug.to_string(),
                name: name.to_string(),
            })
            .collect(),
        tech: tech.into_iter().map(str::to_string).collect(),
        languages: languages.into_iter().map(str::to_string).collect(),
        pricing: pricing.into_iter().map(str::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<ToolkitRecord> {
        vec![
            ToolkitRecord::new(1, "shadcn/ui", "https://ui.shadcn.com")
                .with_description("Beautifully designed components built with Tailwind CSS")
                .with_pricing("free")
                .in_subcategory("design-systems", "components")
                .with_tech(["react", "tailwind"])
                .with_languages(["typescript"]),
            ToolkitRecord::new(2, "Vuetify", "https://vuetifyjs.com")
                .with_pricing("free")
                .in_subcategory("design-systems", "material")
                .with_tech(["vue"])
                .with_languages(["typescript", "javascript"]),
            ToolkitRecord::new(3, "Tailwind UI", "https://tailwindui.com")
                .with_pricing("paid")
                .in_subcategory("templates", "marketing")
                .with_tech(["react", "vue", "html"]),
            ToolkitRecord::new(4, "Untyped", "https://example.com"),
        ]
    }

    fn ids(records: &[ToolkitRecord]) -> Vec<String> {
        records.iter().map(|r| r.id.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filters = FilterState::new();
        for record in catalog() {
            assert!(matches(&record, &filters, ""));
            assert!(matches(&record, &filters, "   "));
        }
    }

    #[test]
    fn test_category_and_subcategory_equality() {
        let records = catalog();
        let filters = FilterState::scoped(Some("design-systems"), None);
        assert_eq!(ids(&apply(&records, &filters, "")), vec!["1", "2"]);

        let filters = FilterState::scoped(Some("design-systems"), Some("material"));
        assert_eq!(ids(&apply(&records, &filters, "")), vec!["2"]);
    }

    #[test]
    fn test_multi_select_is_or_within_dimension() {
        let records = catalog();
        let filters = FilterState::new().with_tech(["vue", "svelte"]);
        assert_eq!(ids(&apply(&records, &filters, "")), vec!["2", "3"]);
    }

    #[test]
    fn test_dimensions_are_and_across() {
        let records = catalog();
        let filters = FilterState::new()
            .with_tech(["react", "vue"])
            .with_languages(["typescript"])
            .with_pricing(["free"]);
        assert_eq!(ids(&apply(&records, &filters, "")), vec!["1", "2"]);

        let filters = filters.with_languages(["javascript"]);
        assert_eq!(ids(&apply(&records, &filters, "")), vec!["2"]);
    }

    #[test]
    fn test_pricing_requires_defined_value() {
        let records = catalog();
        let filters = FilterState::new().with_pricing(["paid"]);
        assert_eq!(ids(&apply(&records, &filters, "")), vec!["3"]);
    }

    #[test]
    fn test_search_name_or_description_case_insensitive() {
        let records = catalog();
        let filters = FilterState::new();
        // "tailwind" hits record 1 via description and record 3 via name.
        assert_eq!(ids(&apply(&records, &filters, "TailWind")), vec!["1", "3"]);
        // Missing description only fails its own clause.
        assert_eq!(ids(&apply(&records, &filters, "untyped")), vec!["4"]);
        assert!(apply(&records, &filters, "nothing-like-this").is_empty());
    }

    #[test]
    fn test_search_ignores_surrounding_whitespace() {
        let records = catalog();
        let filters = FilterState::new();
        assert_eq!(ids(&apply(&records, &filters, " vue ")), vec!["2"]);
        assert_eq!(
            apply(&records, &filters, "\ttailwind"),
            apply(&records, &filters, "tailwind")
        );
    }

    #[test]
    fn test_raw_search_term_in_state_is_ignored() {
        let record = &catalog()[1];
        let filters = FilterState::new().with_search_term("zzz");
        assert!(matches(record, &filters, ""));
    }

    #[test]
    fn test_predicate_agrees_with_per_dimension_definition() {
        let records = catalog();
        let tech_options: [&[&str]; 3] = [&[], &["react"], &["vue", "html"]];
        let pricing_options: [&[&str]; 3] = [&[], &["free"], &["paid", "freemium"]];
        let categories = [None, Some("design-systems"), Some("templates")];
        let terms = ["", "ui", "vue"];

        for tech in tech_options {
            for pricing in pricing_options {
                for category in categories {
                    for term in terms {
                        let filters = FilterState::scoped(category, None)
                            .with_tech(tech.iter().copied())
                            .with_pricing(pricing.iter().copied());
                        for record in &records {
                            let expected = category.is_none_or(|c| record.category_slug() == Some(c))
                                && (tech.is_empty()
                                    || tech.iter().any(|t| record.tech.iter().any(|r| r == t)))
                                && (pricing.is_empty()
                                    || record
                                        .pricing
                                        .as_deref()
                                        .is_some_and(|p| pricing.contains(&p)))
                                && matches_search(record, term);
                            assert_eq!(matches(record, &filters, term), expected);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_facets_collect_sorted_unique_values() {
        let mut records = catalog();
        records.push(
            ToolkitRecord::new(5, "Blank", "https://example.org")
                .with_pricing(" ")
                .with_tech(["", "react"]),
        );
        let facets = facets(&records);

        assert_eq!(facets.tech, vec!["html", "react", "tailwind", "vue"]);
        assert_eq!(facets.languages, vec!["javascript", "typescript"]);
        assert_eq!(facets.pricing, vec!["free", "paid"]);
        let slugs: Vec<&str> = facets.subcategories.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["components", "marketing", "material"]);
        assert_eq!(facets.subcategories[0].name, "components");
    }

    #[test]
    fn test_facets_reflect_only_the_given_list() {
        let records = catalog();
        let filtered = apply(&records, &FilterState::new().with_tech(["vue"]), "");
        assert_eq!(facets(&filtered).tech, vec!["html", "react", "vue"]);
        assert_eq!(facets(&records).tech.len(), 4);
        assert_eq!(facets(&[]), Facets::default());
    }
}
