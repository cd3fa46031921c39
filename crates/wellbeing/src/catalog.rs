//! Suggestion text

/// Used for labels without a suggestion list
pub const FALLBACK_SUGGESTION: &str = "Stay mindful and present in this moment.";

pub(crate) fn suggestions(label: &str) -> &'static [&'static str] {
    match label {
        "Happy" => &[
            "Great mood! Consider sharing your positivity with others.",
            "Keep the good energy going and try something you have been curious about.",
            "Write down what is making you happy today.",
            "A good moment to take on a challenging task.",
        ],
        "Sad" => &[
            "It is okay to feel this way. Take a short break and breathe deeply.",
            "Consider reaching out to a friend or someone you trust.",
            "Some uplifting music or a gentle walk outside may help.",
            "Emotions pass. Be kind to yourself right now.",
            "Journaling your thoughts can help you process them.",
        ],
        "Angry" => &[
            "Take five slow breaths: in for 4, hold for 4, out for 4.",
            "Step away from the situation for a moment if you can.",
            "Tense and release each muscle group in turn.",
            "Put the energy into some exercise or stretching.",
            "Count to ten before responding.",
        ],
        "Fear" => &[
            "Ground yourself: name 5 things you see, 4 you can touch, 3 you hear.",
            "Try box breathing: in 4, hold 4, out 4, hold 4.",
            "You are safe right now. This feeling will pass.",
            "Focus on what you can control at this moment.",
        ],
        "Neutral" => &[
            "Steady state. Set a small, achievable goal for today.",
            "A calm baseline is a good time for planning or reflection.",
            "Balanced energy. Maybe try something new.",
            "A good time for learning or routine tasks.",
        ],
        "Surprise" => &[
            "Something unexpected? Take a moment to process it.",
            "Stay present with what you are experiencing.",
            "Surprises can be opportunities. Stay curious.",
            "Think about what surprised you and what it tells you.",
        ],
        "Disgust" => &[
            "Put some distance between yourself and the trigger.",
            "Not everything needs your judgement right now.",
            "A refreshing, calming activity can help you reset.",
            "Turn your attention to something pleasant nearby.",
        ],
        _ => &[],
    }
}

/// Follow-up advice when one emotion dominates the history
pub(crate) fn pattern_suggestions(label: &str) -> &'static [&'static str] {
    match label {
        "Sad" => &[
            "You have been feeling down for a while. A mental health professional can help.",
            "Persistent sadness often responds well to professional support.",
        ],
        "Angry" => &[
            "Frequent anger can point to underlying stress. Stress management techniques may help.",
            "If anger keeps coming back, exploring its causes with a professional can help.",
        ],
        "Fear" => &[
            "Ongoing anxiety is worth discussing with a healthcare provider.",
            "If worry gets in the way of daily life, professional support makes a difference.",
        ],
        _ => &[],
    }
}

pub(crate) const DAILY_TIPS: &[&str] = &[
    "Stay hydrated. It affects mood more than you think.",
    "Try to get some natural sunlight today.",
    "Quality sleep is key to emotional regulation.",
    "Eating well supports mental health as much as physical health.",
    "Reach out to someone today.",
    "Even ten minutes of movement can lift your mood.",
    "Take regular breaks from screens.",
    "Name three things you are grateful for.",
    "Spend five minutes on something creative.",
    "Small acts of self-care add up.",
];
