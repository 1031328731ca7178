use crate::config::WikiConfig;

pub const MEDIA: i32 = -2;
pub const SPECIAL: i32 = -1;
pub const MAIN: i32 = 0;
pub const TALK: i32 = 1;
pub const USER: i32 = 2;
pub const USER_TALK: i32 = 3;
pub const PROJECT: i32 = 4;
pub const PROJECT_TALK: i32 = 5;
pub const FILE: i32 = 6;
pub const FILE_TALK: i32 = 7;
pub const MEDIAWIKI: i32 = 8;
pub const MEDIAWIKI_TALK: i32 = 9;
pub const TEMPLATE: i32 = 10;
pub const TEMPLATE_TALK: i32 = 11;
pub const HELP: i32 = 12;
pub const HELP_TALK: i32 = 13;
pub const CATEGORY: i32 = 14;
pub const CATEGORY_TALK: i32 = 15;
pub const MODULE: i32 = 828;
pub const MODULE_TALK: i32 = 829;

const CANONICAL_NAMESPACES: &[(&str, i32)] = &[
    ("Media", MEDIA),
    ("Special", SPECIAL),
    ("Talk", TALK),
    ("User", USER),
    ("User talk", USER_TALK),
    ("Project", PROJECT),
    ("Project talk", PROJECT_TALK),
    ("Wikipedia", PROJECT),
    ("Wikipedia talk", PROJECT_TALK),
    ("File", FILE),
    ("File talk", FILE_TALK),
    ("Image", FILE),
    ("Image talk", FILE_TALK),
    ("MediaWiki", MEDIAWIKI),
    ("MediaWiki talk", MEDIAWIKI_TALK),
    ("Template", TEMPLATE),
    ("Template talk", TEMPLATE_TALK),
    ("Help", HELP),
    ("Help talk", HELP_TALK),
    ("Category", CATEGORY),
    ("Category talk", CATEGORY_TALK),
    ("Module", MODULE),
    ("Module talk", MODULE_TALK),
];

pub fn is_talk(namespace: i32) -> bool {
    namespace >= 0 && namespace % 2 == 1
}

/// Namespace of a page title, using canonical names and the configured
/// custom namespaces. Titles without a known prefix are in the main
/// namespace.
pub fn namespace_from_title(title: &str, config: &WikiConfig) -> i32 {
    let Some((prefix, _)) = title.split_once(':') else {
        return MAIN;
    };
    let prefix = prefix.replace('_', " ");
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return MAIN;
    }

    CANONICAL_NAMESPACES
        .iter()
        .map(|(name, id)| (*name, *id))
        .chain(
            config
                .wiki
                .custom_namespaces
                .iter()
                .map(|namespace| (namespace.name.as_str(), namespace.id)),
        )
        .find(|(name, _)| name.replace('_', " ").eq_ignore_ascii_case(prefix))
        .map_or(MAIN, |(_, id)| id)
}

/// Parse a comma-separated namespace list such as `0,2`.
pub fn parse_namespace_list(value: &str) -> Vec<i32> {
    value
        .split(',')
        .filter_map(|item| item.trim().parse::<i32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{CATEGORY, FILE, MAIN, TEMPLATE_TALK, is_talk, namespace_from_title, parse_namespace_list};
    use crate::config::{CustomNamespace, WikiConfig};

    #[test]
    fn resolves_canonical_prefixes() {
        let config = WikiConfig::default();
        assert_eq!(namespace_from_title("Paris", &config), MAIN);
        assert_eq!(namespace_from_title("Image:Map.png", &config), FILE);
        assert_eq!(namespace_from_title("category:Cities", &config), CATEGORY);
        assert_eq!(namespace_from_title("Template_talk:Cite", &config), TEMPLATE_TALK);
        assert_eq!(namespace_from_title("Star Wars: A New Hope", &config), MAIN);
        assert!(is_talk(TEMPLATE_TALK));
    }

    #[test]
    fn resolves_custom_namespaces() {
        let mut config = WikiConfig::default();
        config.wiki.custom_namespaces.push(CustomNamespace {
            name: "Portal".to_string(),
            id: 100,
        });
        assert_eq!(namespace_from_title("Portal:Science", &config), 100);
    }

    #[test]
    fn parses_lists() {
        assert_eq!(parse_namespace_list("0, 2,x,"), vec![0, 2]);
    }
}
