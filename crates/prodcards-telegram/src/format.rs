//! Message texts and formatting helpers

use prodcards_kernel::llm::UsageInfo;

/// Telegram's per-message character limit
pub const MAX_MESSAGE_CHARS: usize = 4096;

pub const FAILURE_TEXT: &str = "❌ Не удалось сгенерировать карточку. Попробуйте позже.";

pub const SEARCHING_TEXT: &str = "🔍 Ищу товар в каталоге...";

pub const CREATE_ANOTHER_TEXT: &str = "✏️ <b>Отлично!</b>\n\nОтправьте название товара или категорию:\n• наушники\n• laptop\n• Sony Speaker";

/// Split `text` into consecutive chunks of at most `max_chars` characters.
///
/// Boundaries fall on `char`s, never inside a UTF-8 sequence.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

/// Escape text for HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

fn numbered(names: &[String]) -> String {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| format!("{}. {}", i + 1, escape_html(n)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn flag(enabled: bool) -> &'static str {
    if enabled { "✅" } else { "❌" }
}

pub fn welcome_text() -> String {
    "🛍️ <b>Добро пожаловать в AI Product Cards Bot!</b>

Я помогу создать профессиональные карточки товаров для маркетплейсов.

<b>Что я умею:</b>
• Генерировать карточки товаров с описанием
• Искать товары по категориям
• Создавать SEO-оптимизированные тексты

<b>Как использовать:</b>
Просто отправьте название товара или категорию:
• \"наушники\"
• \"laptop\"
• \"Sony Speaker\"

<b>Команды:</b>
/list - показать примеры товаров
/help - справка
/info - информация о боте

🚀 Готов к работе!"
        .to_string()
}

pub fn help_text(model: &str, products: usize, tracing_enabled: bool) -> String {
    format!(
        "📚 <b>Справка по использованию бота</b>

<b>Поиск товаров:</b>
Отправьте название или категорию:
• \"наушники\" - найдёт все наушники
• \"Sony Speaker\" - точный поиск
• \"laptop\" - найдёт ноутбуки

<b>Запрос списка товаров:</b>
Можете указать количество:
• \"выведи 5 ноутбуков\"
• \"покажи 15 наушников\"
• \"первых 20 laptop\"
• \"список 10 колонок\"

<b>Генерация карточки:</b>
После поиска я автоматически создам карточку с:
• Названием товара
• Кратким описанием
• Полным описанием
• Преимуществами
• Характеристиками
• SEO-ключевыми словами

<b>Команды:</b>
/start - главное меню
/list - показать случайные товары
/info - информация о системе

<b>Технологии:</b>
• GigaChat {} для генерации
• Каталог: {} товаров
• Langfuse трейсинг: {}

💡 Совет: используйте конкретные запросы для лучших результатов!",
        escape_html(model),
        products,
        flag(tracing_enabled)
    )
}

/// Values shown by `/info`
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub tracing_enabled: bool,
    pub products: usize,
    pub columns: usize,
}

pub fn info_text(info: &BotInfo) -> String {
    format!(
        "🤖 <b>Информация о боте</b>

<b>Конфигурация:</b>
• Модель: {}
• Temperature: {}
• Top-p: {}
• Langfuse: {}

<b>Каталог товаров:</b>
• Всего товаров: {}
• Колонок данных: {}

<b>Возможности:</b>
✅ Умный поиск с синонимами
✅ Генерация продающих текстов
✅ Retry механизм при ошибках
✅ Отслеживание токенов

<b>Версия:</b> {}",
        escape_html(&info.model),
        info.temperature,
        info.top_p,
        if info.tracing_enabled {
            "✅ Включен"
        } else {
            "❌ Отключен"
        },
        info.products,
        info.columns,
        env!("CARGO_PKG_VERSION")
    )
}

pub fn random_list_text(names: &[String]) -> String {
    format!(
        "📋 <b>Случайные {} товаров из каталога:</b>\n\n{}\n\n💡 Отправьте название любого товара для генерации карточки!",
        names.len(),
        numbered(names)
    )
}

pub fn category_list_text(title: &str, names: &[String]) -> String {
    format!(
        "{} - <b>Случайные {} товаров:</b>\n\n{}\n\n💡 Отправьте название товара для создания карточки!",
        title,
        names.len(),
        numbered(names)
    )
}

pub fn category_empty_text(title: &str) -> String {
    format!("❌ Товары категории '{}' не найдены.", title)
}

pub fn found_text(name: &str) -> String {
    format!(
        "✅ Найден товар: <b>{}</b>\n\n⏳ Генерирую карточку...",
        escape_html(name)
    )
}

pub fn suggestions_text(names: &[String]) -> String {
    format!(
        "❌ Точного совпадения не найдено.\n\n<b>Возможно, вы искали:</b>\n{}\n\n💡 Попробуйте уточнить запрос!",
        numbered(names)
    )
}

pub fn not_found_text() -> String {
    "❌ Товар не найден в каталоге.

<b>Попробуйте:</b>
• Использовать другие ключевые слова
• Команду /list для просмотра товаров
• Категории: наушники, ноутбук, колонка, телефон

💡 Примеры: \"Sony Speaker\", \"laptop\", \"headphone\""
        .to_string()
}

pub fn retry_text(next_attempt: u32, max_attempts: u32, wait_secs: u64) -> String {
    format!(
        "⚠️ Проблема с соединением. Повторная попытка {}/{} через {} сек...",
        next_attempt, max_attempts, wait_secs
    )
}

/// Card text followed by the token usage footer
pub fn card_with_usage(card: &str, usage: &UsageInfo) -> String {
    let mut out = format!(
        "{}\n\n━━━━━━━━━━━━━━━━━━━━\n💰 <b>Расход токенов:</b>\n• Входных: {}\n• Выходных: {}\n• Всего: {}",
        card,
        UsageInfo::display(usage.input_tokens),
        UsageInfo::display(usage.output_tokens),
        UsageInfo::display(usage.total_tokens)
    );
    if let Some(cached) = usage.cached_tokens.filter(|c| *c > 0) {
        out.push_str(&format!("\n• Кэшированных: {}", cached));
    }
    out
}

pub fn continue_text() -> String {
    "━━━━━━━━━━━━━━━━━━━━
✅ <b>Карточка готова!</b>

<b>Что дальше?</b>
• 🔍 Создайте карточку для другого товара
• 📋 Посмотрите список доступных товаров
• Или просто отправьте название товара

💡 Например: \"Sony Speaker\", \"laptop\", \"колонка\""
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_not_split() {
        assert_eq!(split_message("привет", 4096), vec!["привет"]);
    }

    #[test]
    fn splits_on_char_boundaries() {
        let text = "ж".repeat(4096 * 2 + 10);
        let parts = split_message(&text, MAX_MESSAGE_CHARS);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].chars().count(), 4096);
        assert_eq!(parts[1].chars().count(), 4096);
        assert_eq!(parts[2].chars().count(), 10);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("a < b & c > d"), "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn usage_footer() {
        let usage = UsageInfo {
            input_tokens: Some(10),
            output_tokens: Some(5),
            total_tokens: Some(15),
            cached_tokens: Some(0),
        };
        let text = card_with_usage("CARD", &usage);
        assert!(text.starts_with("CARD\n"));
        assert!(text.contains("• Всего: 15"));
        assert!(!text.contains("Кэшированных"));

        let cached = UsageInfo {
            cached_tokens: Some(3),
            ..usage
        };
        assert!(card_with_usage("CARD", &cached).contains("• Кэшированных: 3"));

        let unavailable = card_with_usage("CARD", &UsageInfo::unavailable());
        assert!(unavailable.contains("• Входных: N/A"));
    }

    #[test]
    fn lists_are_numbered_and_escaped() {
        let text = random_list_text(&["A<1>".to_string(), "B".to_string()]);
        assert!(text.contains("1. A&lt;1&gt;\n2. B"));
    }
}
