//! Caller guidance, dependent on display capability.

use screenpilot_core::config::DisplayCapability;

const MAIN_ONLY_ADVICE: &str = "\
Main-screen mode: session ids are not supported and session reuse does not apply; \
parallel runs are not available, so do one clear sub-goal per call and split larger work \
into several calls.
Launch first: the first time an app is needed, start the intent with \"Launch <app> ...\" \
so the sub-agent opens it directly instead of searching the home screen.
Every call is a fresh conversation: state what is done, what comes next, and any key facts.
Be self-contained: avoid references like \"these five\" or \"same as before\"; list the items \
and name the current one, or ask the sub-agent to read the list back from the screen first.
Half done is not done: keep pushing toward the goal, and stop with a reason only after 2-3 \
consecutive failures.";

const VIRTUAL_DISPLAY_ADVICE: &str = "\
Virtual-display mode: reuse the returned session_id whenever possible to stay on the same \
virtual screen and app context.
Screen selection: omitting session_id or passing 'default' targets the main screen in \
run_main; run_virtual needs a non-'default' session_id, explicit or returned by an earlier \
successful call. Pass one explicitly on the first virtual call.
Launch first: on a new or changed session_id, start the intent with \"Launch <app> ...\" \
so the sub-agent opens it directly instead of searching the home screen.
Every call is a fresh conversation: state what is done, what comes next, and any key facts.
Be self-contained: avoid references like \"these five\" or \"same as before\"; list the items \
and name the current one, or ask the sub-agent to read the list back from the screen first.
List first, then work item by item; run independent sub-tasks in parallel with \
run_parallel and retry only the branches that failed.
Parallel limits: at most 4 branches, bounded by the distinct apps and sessions available. \
Every branch must name its target_app and an explicit non-'default' session_id, and no app \
may appear in two branches. Do not raise the branch count on a retry; resubmit the failed \
branches or fall back to serial runs.
Half done is not done: keep pushing toward the goal, and stop with a reason only after 2-3 \
consecutive failures.";

/// Guidance text for the given capability.
pub const fn usage_advice(display: DisplayCapability) -> &'static str {
    match display {
        DisplayCapability::MainOnly => MAIN_ONLY_ADVICE,
        DisplayCapability::VirtualDisplay => VIRTUAL_DISPLAY_ADVICE,
    }
}
