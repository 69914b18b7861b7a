//! Case transforms applied to insert values when they are rendered.

use cruet::case::{
    camel::to_camel_case, kebab::to_kebab_case, pascal::to_pascal_case,
    screaming_snake::to_screaming_snake_case, snake::to_snake_case,
};
use std::fmt::Display;

/// A rendering function chosen when the template is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransform {
    /// `entityName`
    Camel,
    /// `entity-name`
    Kebab,
    /// `EntityName`
    Pascal,
    /// `entity_name`
    Snake,
    /// `ENTITY_NAME`
    ScreamingSnake,
    /// `Entity name`
    Sentence,
}

impl CaseTransform {
    /// Candidates in inference order. A later match overrides an earlier one.
    pub const ALL: [CaseTransform; 6] = [
        CaseTransform::Camel,
        CaseTransform::Kebab,
        CaseTransform::Pascal,
        CaseTransform::Snake,
        CaseTransform::ScreamingSnake,
        CaseTransform::Sentence,
    ];

    pub fn apply(&self, value: &str) -> String {
        if value.is_empty() {
            return String::new();
        }
        match self {
            CaseTransform::Camel => to_camel_case(value),
            CaseTransform::Kebab => to_kebab_case(value),
            CaseTransform::Pascal => to_pascal_case(value),
            CaseTransform::Snake => to_snake_case(value),
            CaseTransform::ScreamingSnake => to_screaming_snake_case(value),
            CaseTransform::Sentence => to_sentence(value),
        }
    }

    /// Finds the transform whose rendering of `literal` reproduces it exactly.
    pub fn infer(literal: &str) -> Option<CaseTransform> {
        Self::ALL
            .iter()
            .filter(|case| case.apply(literal) == literal)
            .last()
            .copied()
    }
}

impl Display for CaseTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CaseTransform::Camel => "camel",
            CaseTransform::Kebab => "kebab",
            CaseTransform::Pascal => "pascal",
            CaseTransform::Snake => "snake",
            CaseTransform::ScreamingSnake => "screaming_snake",
            CaseTransform::Sentence => "sentence",
        };
        write!(f, "{s}")
    }
}

fn to_sentence(value: &str) -> String {
    let lower = to_snake_case(value).replace('_', " ");
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Normal form used to compare merge field values.
pub fn normalize(value: &str) -> String {
    to_snake_case(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_case_from_literal() {
        assert_eq!(CaseTransform::infer("entityName"), Some(CaseTransform::Camel));
        assert_eq!(CaseTransform::infer("entity-name"), Some(CaseTransform::Kebab));
        assert_eq!(CaseTransform::infer("EntityName"), Some(CaseTransform::Pascal));
        assert_eq!(CaseTransform::infer("entity_name"), Some(CaseTransform::Snake));
        assert_eq!(
            CaseTransform::infer("ENTITY_NAME"),
            Some(CaseTransform::ScreamingSnake)
        );
    }

    #[test]
    fn rejects_mixed_literal() {
        assert_eq!(CaseTransform::infer("entity_Name-x"), None);
    }

    #[test]
    fn applies_transforms() {
        assert_eq!(CaseTransform::Pascal.apply("relation_uuid"), "RelationUuid");
        assert_eq!(CaseTransform::Pascal.apply("DeletedAt"), "DeletedAt");
        assert_eq!(CaseTransform::Snake.apply("DeletedAt"), "deleted_at");
        assert_eq!(CaseTransform::Camel.apply("only_uuid"), "onlyUuid");
        assert_eq!(CaseTransform::Kebab.apply("only_uuid"), "only-uuid");
        assert_eq!(CaseTransform::ScreamingSnake.apply("only_uuid"), "ONLY_UUID");
        assert_eq!(CaseTransform::Sentence.apply("only_uuid"), "Only uuid");
        assert_eq!(CaseTransform::Pascal.apply(""), "");
    }

    #[test]
    fn normalizes_merge_values() {
        assert_eq!(normalize("RelationUuid"), normalize("relation_uuid"));
        assert_eq!(normalize("Uuid"), "uuid");
    }
}
