use ui_transfer::driver::simulated::{SimElement, SimulatedApp};

pub const PACKAGE: &str = "com.demo";
pub const MAIN: &str = "com.demo.MainActivity";
pub const LOGIN: &str = "com.demo.LoginActivity";
pub const HOME: &str = "com.demo.HomeActivity";

pub fn rid(short: &str) -> String {
    format!("{}:id/{}", PACKAGE, short)
}

/// Main -> Login (username, password, submit) -> Home.
pub fn login_app() -> SimulatedApp {
    SimulatedApp::new(PACKAGE, MAIN)
        .screen(
            MAIN,
            vec![
                SimElement::text_view("Welcome"),
                SimElement::button(&rid("login_btn"), "Log In").navigates_to(LOGIN),
            ],
        )
        .screen(
            LOGIN,
            vec![
                SimElement::edit_text(&rid("username")),
                SimElement::edit_text(&rid("password")),
                SimElement::button(&rid("submit"), "Sign in").navigates_to(HOME),
            ],
        )
        .screen(HOME, vec![SimElement::text_view("Hello user")])
}

/// A note editor whose best-looking title field does not accept input.
pub fn notes_app() -> SimulatedApp {
    SimulatedApp::new(PACKAGE, MAIN).screen(
        MAIN,
        vec![
            SimElement::edit_text(&rid("note_title")).read_only(),
            SimElement::edit_text(&rid("title_input")),
            SimElement::button(&rid("save"), "Save"),
        ],
    )
}

/// "Help" leaves the app for a browser; "Help center" stays inside.
pub fn help_app() -> SimulatedApp {
    SimulatedApp::new(PACKAGE, MAIN)
        .screen(
            MAIN,
            vec![
                SimElement::button(&rid("help"), "Help").navigates_to("org.browser.WebActivity"),
                SimElement::button(&rid("help_center"), "Help center")
                    .navigates_to("com.demo.HelpActivity"),
            ],
        )
        .external_screen(
            "org.browser",
            "org.browser.WebActivity",
            vec![SimElement::text_view("FAQ")],
        )
        .screen("com.demo.HelpActivity", vec![SimElement::text_view("FAQ")])
}

/// The only text view sits one click away from the launch screen.
pub fn deep_text_app() -> SimulatedApp {
    SimulatedApp::new(PACKAGE, MAIN)
        .screen(
            MAIN,
            vec![SimElement::button(&rid("open"), "Open").navigates_to("com.demo.DetailActivity")],
        )
        .screen(
            "com.demo.DetailActivity",
            vec![SimElement::text_view("Deep text")],
        )
}
