use super::Plan;

/// Advisory strings for a plan, in display order.
///
/// Every rule that matches contributes one tip; the session-length rule and
/// the prep rule always contribute exactly one.
pub fn study_tips(total_minutes: u32, plan: &Plan) -> Vec<&'static str> {
    let mut tips = Vec::new();

    tips.push(match total_minutes {
        100.. => "Try the pomodoro technique: 25 minutes of study, then a 5 minute break.",
        60..=99 => "Keep your focus with 20 minute study blocks and 5 minute breaks.",
        40..=59 => "Study in 15 minute blocks with 3 minute breaks to stay efficient.",
        25..=39 => "Work in short 10 minute blocks with 2 minute breaks.",
        _ => "It's a short session, so dive in and finish it in one go.",
    });

    match plan.len() {
        5.. => tips.push("Take a 3-5 minute break when you switch subjects."),
        3..=4 => tips.push("Start with your weakest subject while you are still fresh."),
        2 => tips.push("Stretch a little when you switch between the two subjects."),
        _ => {}
    }

    if plan.iter().any(|e| e.reason.is_some()) {
        tips.push("For test prep, focus on past papers and reviewing the key points.");
    } else {
        tips.push("Set a clear goal for today before you start.");
    }

    let math = plan
        .iter()
        .filter(|e| e.subject.to_lowercase().contains("math"))
        .count();
    if math >= 2 {
        tips.push("Leave time to double-check your work in math to catch calculation slips.");
    }

    tips
}
