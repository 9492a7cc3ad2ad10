//! Page templates.
//!
//! Every page goes through [`base`], which supplies the header, navigation,
//! flash message and footer around the page body.

use chrono::{DateTime, Utc};
use maud::{html, Markup, DOCTYPE};

use crate::csrf::CSRF_FIELD;
use crate::handlers::{SnippetCreateForm, UserLoginForm, UserSignupForm};
use crate::models::Snippet;
use crate::validator::Validator;

/// Data every page needs regardless of its body.
#[derive(Debug, Clone)]
pub struct TemplateData {
    pub current_year: i32,
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
}

pub fn human_date(t: &DateTime<Utc>) -> String {
    t.format("%d %b %Y at %H:%M").to_string()
}

fn csrf_input(data: &TemplateData) -> Markup {
    html! {
        input type="hidden" name=(CSRF_FIELD) value=(data.csrf_token);
    }
}

fn field_error(validator: &Validator, key: &str) -> Markup {
    html! {
        @if let Some(message) = validator.field_error(key) {
            label class="error" { (message) }
        }
    }
}

fn nav(data: &TemplateData) -> Markup {
    html! {
        nav {
            div {
                a href="/" { "Home" }
                @if data.is_authenticated {
                    a href="/snippet/create" { "Create snippet" }
                }
            }
            div {
                @if data.is_authenticated {
                    form action="/user/logout" method="POST" {
                        (csrf_input(data))
                        button { "Logout" }
                    }
                } @else {
                    a href="/user/signup" { "Signup" }
                    a href="/user/login" { "Login" }
                }
            }
        }
    }
}

fn base(title: &str, data: &TemplateData, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) " - Snippetbox" }
                link rel="stylesheet" href="/static/css/main.css";
                link rel="stylesheet" href="https://fonts.googleapis.com/css?family=Ubuntu+Mono:400,700";
            }
            body {
                header {
                    h1 { a href="/" { "Snippetbox" } }
                }
                (nav(data))
                main {
                    @if let Some(flash) = &data.flash {
                        div class="flash" { (flash) }
                    }
                    (content)
                }
                footer { "Powered by Rust in " (data.current_year) }
                script src="/static/js/main.js" type="text/javascript" {}
            }
        }
    }
}

pub fn home_page(data: &TemplateData, snippets: &[Snippet]) -> Markup {
    base("Home", data, html! {
        h2 { "Latest Snippets" }
        @if snippets.is_empty() {
            p { "There's nothing to see here... yet!" }
        } @else {
            table {
                tr {
                    th { "Title" }
                    th { "Created" }
                    th { "ID" }
                }
                @for snippet in snippets {
                    tr {
                        td { a href={ "/snippet/view/" (snippet.id) } { (snippet.title) } }
                        td { (human_date(&snippet.created)) }
                        td { "#" (snippet.id) }
                    }
                }
            }
        }
    })
}

pub fn view_page(data: &TemplateData, snippet: &Snippet) -> Markup {
    base(&format!("Snippet #{}", snippet.id), data, html! {
        div class="snippet" {
            div class="metadata" {
                strong { (snippet.title) }
                span { "#" (snippet.id) }
            }
            pre { code { (snippet.content) } }
            div class="metadata" {
                time { "Created: " (human_date(&snippet.created)) }
                time { "Expires: " (human_date(&snippet.expires)) }
            }
        }
    })
}

pub fn create_page(data: &TemplateData, form: &SnippetCreateForm) -> Markup {
    base("Create a New Snippet", data, html! {
        form action="/snippet/create" method="POST" {
            (csrf_input(data))
            div {
                label { "Title:" }
                (field_error(&form.validator, "title"))
                input type="text" name="title" value=(form.title);
            }
            div {
                label { "Content:" }
                (field_error(&form.validator, "content"))
                textarea name="content" { (form.content) }
            }
            div {
                label { "Delete in:" }
                (field_error(&form.validator, "expires"))
                @for (days, label) in [(365, "One Year"), (7, "One Week"), (1, "One Day")] {
                    input type="radio" name="expires" value=(days) checked[form.expires == days];
                    " " (label) " "
                }
            }
            div {
                input type="submit" value="Publish snippet";
            }
        }
    })
}

pub fn signup_page(data: &TemplateData, form: &UserSignupForm) -> Markup {
    base("Signup", data, html! {
        form action="/user/signup" method="POST" novalidate {
            (csrf_input(data))
            div {
                label { "Name:" }
                (field_error(&form.validator, "name"))
                input type="text" name="name" value=(form.name);
            }
            div {
                label { "Email:" }
                (field_error(&form.validator, "email"))
                input type="email" name="email" value=(form.email);
            }
            div {
                label { "Password:" }
                (field_error(&form.validator, "password"))
                input type="password" name="password";
            }
            div {
                input type="submit" value="Signup";
            }
        }
    })
}

pub fn login_page(data: &TemplateData, form: &UserLoginForm) -> Markup {
    base("Login", data, html! {
        form action="/user/login" method="POST" novalidate {
            (csrf_input(data))
            @for message in &form.validator.non_field_errors {
                div class="error" { (message) }
            }
            div {
                label { "Email:" }
                (field_error(&form.validator, "email"))
                input type="email" name="email" value=(form.email);
            }
            div {
                label { "Password:" }
                (field_error(&form.validator, "password"))
                input type="password" name="password";
            }
            div {
                input type="submit" value="Login";
            }
        }
    })
}
