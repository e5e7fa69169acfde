//! Inbound text classification
//!
//! Every message is one of: a slash command, a reply-keyboard button, a
//! quantity listing request ("выведи 5 ноутбуков") or a free-text search.

use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on a quantity request
pub const MAX_QUANTITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Info,
    List,
}

impl Command {
    /// `/start`, `/start@SomeBot` and `/start args` all parse as `Start`
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "info" => Some(Self::Info),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    ProductList,
    Help,
    CreateAnother,
    Headphones,
    Laptops,
}

impl Button {
    pub const ALL: [Button; 5] = [
        Button::CreateAnother,
        Button::ProductList,
        Button::Headphones,
        Button::Laptops,
        Button::Help,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ProductList => "📋 Список товаров",
            Self::Help => "ℹ️ Справка",
            Self::CreateAnother => "🔍 Создать ещё карточку",
            Self::Headphones => "🎧 Наушники",
            Self::Laptops => "💻 Ноутбуки",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == text)
    }
}

/// A category listing with an explicit count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityRequest {
    pub quantity: usize,
    /// Canonical category token fed to the listing search
    pub category: &'static str,
    pub title: &'static str,
}

/// Inflected category word -> (canonical category, display title)
const CATEGORY_WORDS: &[(&str, &str, &str)] = &[
    ("ноутбук", "ноутбук", "💻 Ноутбуки"),
    ("ноутбуков", "ноутбук", "💻 Ноутбуки"),
    ("ноутбука", "ноутбук", "💻 Ноутбуки"),
    ("ноутбуки", "ноутбук", "💻 Ноутбуки"),
    ("laptop", "ноутбук", "💻 Laptops"),
    ("laptops", "ноутбук", "💻 Laptops"),
    ("notebook", "ноутбук", "💻 Notebooks"),
    ("notebooks", "ноутбук", "💻 Notebooks"),
    ("наушники", "наушники", "🎧 Наушники"),
    ("наушник", "наушники", "🎧 Наушники"),
    ("наушников", "наушники", "🎧 Наушники"),
    ("наушника", "наушники", "🎧 Наушники"),
    ("headphone", "наушники", "🎧 Headphones"),
    ("headphones", "наушники", "🎧 Headphones"),
    ("earphone", "наушники", "🎧 Earphones"),
    ("earphones", "наушники", "🎧 Earphones"),
    ("earbud", "наушники", "🎧 Earbuds"),
    ("earbuds", "наушники", "🎧 Earbuds"),
    ("колонка", "колонка", "🔊 Колонки"),
    ("колонки", "колонка", "🔊 Колонки"),
    ("колонок", "колонка", "🔊 Колонки"),
    ("speaker", "колонка", "🔊 Speakers"),
    ("speakers", "колонка", "🔊 Speakers"),
    ("телефон", "телефон", "📱 Телефоны"),
    ("телефона", "телефон", "📱 Телефоны"),
    ("телефонов", "телефон", "📱 Телефоны"),
    ("phone", "телефон", "📱 Phones"),
    ("phones", "телефон", "📱 Phones"),
    ("smartphone", "телефон", "📱 Smartphones"),
    ("smartphones", "телефон", "📱 Smartphones"),
];

/// Tried in order; the first pattern whose match names a known category wins
static QUANTITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"выведи\s+(\d+)\s+(\w+)",
        r"покажи\s+(\d+)\s+(\w+)",
        r"первых\s+(\d+)\s+(\w+)",
        r"список\s+(\d+)\s+(\w+)",
        r"(\d+)\s+(\w+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid quantity pattern"))
    .collect()
});

fn category_word(word: &str) -> Option<(&'static str, &'static str)> {
    CATEGORY_WORDS
        .iter()
        .find(|(w, _, _)| *w == word)
        .map(|(_, category, title)| (*category, *title))
}

/// Parse "выведи 5 ноутбуков", "первых 20 laptop", "10 наушников" and similar
pub fn parse_quantity_command(text: &str) -> Option<QuantityRequest> {
    let lowered = text.to_lowercase();

    for pattern in QUANTITY_PATTERNS.iter() {
        let Some(caps) = pattern.captures(&lowered) else {
            continue;
        };
        let Some((category, title)) = category_word(&caps[2]) else {
            continue;
        };
        // absurdly long digit strings saturate to the cap
        let quantity = caps[1].parse::<usize>().unwrap_or(usize::MAX);
        return Some(QuantityRequest {
            quantity: quantity.min(MAX_QUANTITY),
            category,
            title,
        });
    }

    None
}

/// What an inbound text asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Command(Command),
    Button(Button),
    Quantity(QuantityRequest),
    Search(String),
}

pub fn classify(text: &str) -> Intent {
    let text = text.trim();
    if let Some(command) = Command::parse(text) {
        return Intent::Command(command);
    }
    if let Some(button) = Button::parse(text) {
        return Intent::Button(button);
    }
    if let Some(request) = parse_quantity_command(text) {
        return Intent::Quantity(request);
    }
    Intent::Search(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/help@ProductCardsBot"), Some(Command::Help));
        assert_eq!(Command::parse("/list please"), Some(Command::List));
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("start"), None);
    }

    #[test]
    fn buttons_round_trip_labels() {
        for button in Button::ALL {
            assert_eq!(Button::parse(button.label()), Some(button));
        }
        assert_eq!(Button::parse("Наушники"), None);
    }

    #[test]
    fn quantity_patterns() {
        let req = parse_quantity_command("Выведи 5 ноутбуков").unwrap();
        assert_eq!((req.quantity, req.category, req.title), (5, "ноутбук", "💻 Ноутбуки"));

        let req = parse_quantity_command("покажи 15 наушников").unwrap();
        assert_eq!((req.quantity, req.category), (15, "наушники"));

        let req = parse_quantity_command("первых 20 laptop").unwrap();
        assert_eq!(req.title, "💻 Laptops");

        let req = parse_quantity_command("10 колонок").unwrap();
        assert_eq!(req.category, "колонка");
    }

    #[test]
    fn quantity_is_capped() {
        assert_eq!(parse_quantity_command("выведи 500 phones").unwrap().quantity, 50);
        assert_eq!(
            parse_quantity_command("выведи 99999999999999999999999 phones")
                .unwrap()
                .quantity,
            50
        );
    }

    #[test]
    fn unknown_category_is_not_a_quantity_command() {
        assert!(parse_quantity_command("выведи 5 товаров").is_none());
        assert!(parse_quantity_command("Sony Speaker").is_none());
    }

    #[test]
    fn classification_order() {
        assert_eq!(classify(" /start "), Intent::Command(Command::Start));
        assert_eq!(classify("💻 Ноутбуки"), Intent::Button(Button::Laptops));
        assert!(matches!(classify("список 3 speakers"), Intent::Quantity(_)));
        assert_eq!(classify("Sony Speaker"), Intent::Search("Sony Speaker".into()));
    }
}
