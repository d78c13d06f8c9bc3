//! Built-in voice targets and global phrases
//!
//! The fixed OS-utility set lives here as data: an ordered list of
//! (keyword set, target) pairs checked in priority order, instead of a
//! chain of substring ifs. Matching is plain containment, same as the
//! user command table. User keywords are validated against these sets
//! at table-load time, so the two can never shadow each other.

/// A target the assistant knows without any user configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTarget {
    VolumeMixer,
    Calculator,
    Paint,
    EnvironmentVariables,
    TaskManager,
    RecycleBin,
    AppData,
    WidgetPanel,
}

pub struct BuiltinEntry {
    pub keywords: &'static [&'static str],
    pub target: BuiltinTarget,
}

/// Checked top to bottom; the first entry with a contained keyword wins.
pub const BUILTINS: &[BuiltinEntry] = &[
    BuiltinEntry {
        keywords: &["диспетчер задач", "диспетчер"],
        target: BuiltinTarget::TaskManager,
    },
    BuiltinEntry {
        keywords: &["микшер", "громкост"],
        target: BuiltinTarget::VolumeMixer,
    },
    BuiltinEntry {
        keywords: &["калькул"],
        target: BuiltinTarget::Calculator,
    },
    BuiltinEntry {
        keywords: &["паинт", "пэинт", "paint"],
        target: BuiltinTarget::Paint,
    },
    BuiltinEntry {
        keywords: &["переменн"],
        target: BuiltinTarget::EnvironmentVariables,
    },
    BuiltinEntry {
        keywords: &["корзин"],
        target: BuiltinTarget::RecycleBin,
    },
    BuiltinEntry {
        keywords: &["аппдат", "appdata"],
        target: BuiltinTarget::AppData,
    },
    BuiltinEntry {
        keywords: &["виджет", "панел"],
        target: BuiltinTarget::WidgetPanel,
    },
];

/// First built-in whose keyword appears in `text`.
pub fn find_target(text: &str) -> Option<BuiltinTarget> {
    BUILTINS
        .iter()
        .find(|entry| entry.keywords.iter().any(|k| text.contains(k)))
        .map(|entry| entry.target)
}

/// The built-in keyword that overlaps `keyword` (either containing it or
/// contained by it), if any. Used to reject conflicting user keywords.
pub fn overlapping_keyword(keyword: &str) -> Option<&'static str> {
    BUILTINS
        .iter()
        .flat_map(|entry| entry.keywords.iter())
        .find(|b| keyword.contains(**b) || b.contains(keyword))
        .copied()
}

impl BuiltinTarget {
    /// Command line that opens the utility, when it is one.
    pub fn open_utility(self) -> Option<&'static str> {
        match self {
            BuiltinTarget::VolumeMixer => Some("sndvol"),
            BuiltinTarget::Calculator => Some("calc"),
            BuiltinTarget::Paint => Some("mspaint"),
            BuiltinTarget::EnvironmentVariables => {
                Some("rundll32 sysdm.cpl,EditEnvironmentVariables")
            }
            BuiltinTarget::TaskManager => Some("taskmgr"),
            BuiltinTarget::RecycleBin => Some("explorer shell:RecycleBinFolder"),
            BuiltinTarget::AppData | BuiltinTarget::WidgetPanel => None,
        }
    }

    /// Environment variable holding the folder to open, when the target
    /// is a special folder.
    pub fn open_folder_env(self) -> Option<&'static str> {
        match self {
            BuiltinTarget::AppData => Some("APPDATA"),
            _ => None,
        }
    }

    /// Image name killed on "close", when the target is a process.
    pub fn close_process(self) -> Option<&'static str> {
        match self {
            BuiltinTarget::VolumeMixer => Some("SndVol.exe"),
            BuiltinTarget::Calculator => Some("CalculatorApp.exe"),
            BuiltinTarget::Paint => Some("mspaint.exe"),
            BuiltinTarget::EnvironmentVariables => Some("rundll32.exe"),
            BuiltinTarget::TaskManager => Some("Taskmgr.exe"),
            _ => None,
        }
    }

    /// Window-title fragment closed on "close", for folder-like targets.
    pub fn close_window_fragment(self) -> Option<&'static str> {
        match self {
            BuiltinTarget::RecycleBin => Some("корзина"),
            BuiltinTarget::AppData => Some("appdata"),
            _ => None,
        }
    }

    pub fn is_panel(self) -> bool {
        matches!(self, BuiltinTarget::WidgetPanel)
    }
}

/// Whole-machine phrases handled before anything else on the main path.
pub fn is_shutdown(text: &str) -> bool {
    ["выключи компьютер", "заверши работу"]
        .iter()
        .any(|phrase| text.contains(phrase))
}

pub fn is_restart(text: &str) -> bool {
    ["перезагрузи компьютер", "перезагрузись"]
        .iter()
        .any(|phrase| text.contains(phrase))
}

/// Query text of a web-search request, when `text` is one.
pub fn search_query(text: &str) -> Option<String> {
    for keyword in ["загугли", "найди в интернете", "найди", "поиск"] {
        if let Some(idx) = text.find(keyword) {
            let query = text[idx + keyword.len()..].trim();
            if !query.is_empty() {
                return Some(query.to_string());
            }
        }
    }
    None
}

pub fn is_screenshot(text: &str) -> bool {
    ["скриншот", "снимок экрана"]
        .iter()
        .any(|phrase| text.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_target_matches_by_containment() {
        assert_eq!(
            find_target("открой калькулятор"),
            Some(BuiltinTarget::Calculator)
        );
        assert_eq!(find_target("закрой паинт"), Some(BuiltinTarget::Paint));
        assert_eq!(
            find_target("открой диспетчер задач"),
            Some(BuiltinTarget::TaskManager)
        );
        assert_eq!(find_target("открой браузер"), None);
    }

    #[test]
    fn priority_order_is_positional() {
        // "диспетчер" sits above "панел", so a task-manager request can
        // never fall through to the widget panel.
        assert_eq!(
            find_target("открой панель диспетчер задач"),
            Some(BuiltinTarget::TaskManager)
        );
    }

    #[test]
    fn overlap_detection_is_bidirectional() {
        // User keyword containing a built-in keyword
        assert_eq!(overlapping_keyword("мой калькулятор"), Some("калькул"));
        // User keyword contained by a built-in keyword
        assert_eq!(overlapping_keyword("дат"), Some("аппдат"));
        assert_eq!(overlapping_keyword("браузер"), None);
    }

    #[test]
    fn global_phrases() {
        assert!(is_shutdown("джо выключи компьютер"));
        assert!(!is_shutdown("джо выключи музыку"));
        assert!(is_restart("джо перезагрузи компьютер пожалуйста"));
    }

    #[test]
    fn search_query_extraction() {
        assert_eq!(
            search_query("джо загугли погоду в москве").as_deref(),
            Some("погоду в москве")
        );
        assert_eq!(search_query("джо загугли"), None);
        assert_eq!(search_query("просто болтаем"), None);
    }

    #[test]
    fn screenshot_detection() {
        assert!(is_screenshot("джо сделай скриншот"));
        assert!(!is_screenshot("джо открой браузер"));
    }
}
