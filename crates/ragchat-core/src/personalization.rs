//! Response style preferences and the prompt suffix they produce.

use serde::{Deserialize, Serialize};

/// Overall writing style requested from the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseStyle {
    #[default]
    Default,
    Professional,
    Friendly,
    Candid,
    Quirky,
    Efficient,
    Nerdy,
    Cynical,
}

impl BaseStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseStyle::Default => "default",
            BaseStyle::Professional => "professional",
            BaseStyle::Friendly => "friendly",
            BaseStyle::Candid => "candid",
            BaseStyle::Quirky => "quirky",
            BaseStyle::Efficient => "efficient",
            BaseStyle::Nerdy => "nerdy",
            BaseStyle::Cynical => "cynical",
        }
    }

    pub fn all() -> Vec<BaseStyle> {
        vec![
            BaseStyle::Default,
            BaseStyle::Professional,
            BaseStyle::Friendly,
            BaseStyle::Candid,
            BaseStyle::Quirky,
            BaseStyle::Efficient,
            BaseStyle::Nerdy,
            BaseStyle::Cynical,
        ]
    }

    pub fn next(&self) -> BaseStyle {
        let all = Self::all();
        let i = all.iter().position(|s| s == self).unwrap_or(0);
        all[(i + 1) % all.len()]
    }
}

/// A three-way dial: leave it to the model, push it up, or tone it down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dial {
    #[default]
    Default,
    More,
    Less,
}

impl Dial {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dial::Default => "default",
            Dial::More => "more",
            Dial::Less => "less",
        }
    }

    /// default -> more -> less -> default
    pub fn cycle(&self) -> Dial {
        match self {
            Dial::Default => Dial::More,
            Dial::More => Dial::Less,
            Dial::Less => Dial::Default,
        }
    }
}

/// Names of the individual dials, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialKind {
    Concise,
    Headers,
    Warm,
    Enthusiastic,
    Formal,
    Emoji,
}

impl DialKind {
    pub fn all() -> Vec<DialKind> {
        vec![
            DialKind::Concise,
            DialKind::Headers,
            DialKind::Warm,
            DialKind::Enthusiastic,
            DialKind::Formal,
            DialKind::Emoji,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DialKind::Concise => "Concise",
            DialKind::Headers => "Headers & Lists",
            DialKind::Warm => "Warm",
            DialKind::Enthusiastic => "Enthusiastic",
            DialKind::Formal => "Formal",
            DialKind::Emoji => "Emoji",
        }
    }

    /// Sentences added to the prompt for `more` and `less`
    fn sentences(&self) -> (&'static str, &'static str) {
        match self {
            DialKind::Concise => (
                "Be very concise and brief in your responses.",
                "Provide detailed and comprehensive explanations.",
            ),
            DialKind::Headers => (
                "Use more headers, bullet points, and structured formatting.",
                "Use fewer headers and lists, prefer paragraph format.",
            ),
            DialKind::Warm => (
                "Be warm, friendly, and personable in your tone.",
                "Maintain a neutral and straightforward tone.",
            ),
            DialKind::Enthusiastic => (
                "Be enthusiastic and energetic in your responses.",
                "Keep responses calm and measured.",
            ),
            DialKind::Formal => (
                "Use formal language and professional terminology.",
                "Use casual and conversational language.",
            ),
            DialKind::Emoji => (
                "Use emojis frequently to add expression.",
                "Minimize or avoid using emojis.",
            ),
        }
    }
}

/// Persisted under the `personalization` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Personalization {
    pub base_style: BaseStyle,
    pub concise: Dial,
    pub headers: Dial,
    pub warm: Dial,
    pub enthusiastic: Dial,
    pub formal: Dial,
    pub emoji: Dial,
}

impl Personalization {
    pub fn dial(&self, kind: DialKind) -> Dial {
        match kind {
            DialKind::Concise => self.concise,
            DialKind::Headers => self.headers,
            DialKind::Warm => self.warm,
            DialKind::Enthusiastic => self.enthusiastic,
            DialKind::Formal => self.formal,
            DialKind::Emoji => self.emoji,
        }
    }

    pub fn dial_mut(&mut self, kind: DialKind) -> &mut Dial {
        match kind {
            DialKind::Concise => &mut self.concise,
            DialKind::Headers => &mut self.headers,
            DialKind::Warm => &mut self.warm,
            DialKind::Enthusiastic => &mut self.enthusiastic,
            DialKind::Formal => &mut self.formal,
            DialKind::Emoji => &mut self.emoji,
        }
    }

    pub fn cycle_dial(&mut self, kind: DialKind) {
        let dial = self.dial_mut(kind);
        *dial = dial.cycle();
    }

    pub fn cycle_base_style(&mut self) {
        self.base_style = self.base_style.next();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Build the text appended to the backend prompt.
    ///
    /// Empty when nothing deviates from the defaults.
    pub fn build_prompt(&self) -> String {
        let mut prompts: Vec<String> = Vec::new();

        if self.base_style != BaseStyle::Default {
            prompts.push(format!("Use a {} writing style.", self.base_style.as_str()));
        }

        for kind in DialKind::all() {
            let (more, less) = kind.sentences();
            match self.dial(kind) {
                Dial::More => prompts.push(more.to_string()),
                Dial::Less => prompts.push(less.to_string()),
                Dial::Default => {}
            }
        }

        if prompts.is_empty() {
            String::new()
        } else {
            format!("\nPersonalization preferences: {}", prompts.join(" "))
        }
    }
}
