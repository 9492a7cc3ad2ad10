use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use maud::Markup;
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::ModelError;
use crate::state::AppState;
use crate::validator::{self, Validator, EMAIL_RX};
use crate::views;

const BLANK: &str = "This field cannot be blank";
const INVALID_EMAIL: &str = "This field must be a valid email address";
const DEFAULT_EXPIRES_DAYS: i64 = 365;
const DEFAULT_AFTER_LOGIN: &str = "/snippet/create";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SnippetCreateForm {
    pub title: String,
    pub content: String,
    pub expires: i64,
    #[serde(skip)]
    pub validator: Validator,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserSignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub validator: Validator,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserLoginForm {
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub validator: Validator,
}

fn render(status: StatusCode, page: Markup) -> Response {
    (status, Html(page.into_string())).into_response()
}

/// A body that cannot be decoded into the form is the client's fault.
fn decode_post_form<T>(form: Result<Form<T>, FormRejection>) -> Result<T, AppError> {
    form.map(|Form(form)| form).map_err(|rejection| {
        tracing::debug!(error = %rejection, "undecodable form");
        AppError::ClientError(StatusCode::BAD_REQUEST)
    })
}

pub async fn home(State(state): State<AppState>, ctx: RequestContext) -> Result<Response, AppError> {
    let snippets = state.snippets.latest().await?;
    Ok(render(StatusCode::OK, views::home_page(&ctx.template_data()?, &snippets)))
}

pub async fn snippet_view(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = id
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 1)
        .ok_or(AppError::NotFound)?;

    let snippet = match state.snippets.get(id).await {
        Ok(snippet) => snippet,
        Err(ModelError::NoRecord) => return Err(AppError::NotFound),
        Err(err) => return Err(err.into()),
    };

    Ok(render(StatusCode::OK, views::view_page(&ctx.template_data()?, &snippet)))
}

pub async fn snippet_create(ctx: RequestContext) -> Result<Response, AppError> {
    let form = SnippetCreateForm {
        expires: DEFAULT_EXPIRES_DAYS,
        ..Default::default()
    };
    Ok(render(StatusCode::OK, views::create_page(&ctx.template_data()?, &form)))
}

pub async fn snippet_create_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    form: Result<Form<SnippetCreateForm>, FormRejection>,
) -> Result<Response, AppError> {
    let mut form = decode_post_form(form)?;

    form.validator.check_field(validator::not_blank(&form.title), "title", BLANK);
    form.validator.check_field(
        validator::max_chars(&form.title, 100),
        "title",
        "This field cannot be more than 100 characters long",
    );
    form.validator.check_field(validator::not_blank(&form.content), "content", BLANK);
    form.validator.check_field(
        validator::permitted_value(form.expires, &[1, 7, 365]),
        "expires",
        "This field must equal 1, 7 or 365",
    );

    if !form.validator.valid() {
        return Ok(render(
            StatusCode::UNPROCESSABLE_ENTITY,
            views::create_page(&ctx.template_data()?, &form),
        ));
    }

    let id = state
        .snippets
        .insert(&form.title, &form.content, form.expires)
        .await?;
    tracing::info!(snippet_id = id, "snippet created");

    ctx.session.put_flash("Snippet successfully created!")?;
    Ok(Redirect::to(&format!("/snippet/view/{id}")).into_response())
}

pub async fn user_signup(ctx: RequestContext) -> Result<Response, AppError> {
    Ok(render(
        StatusCode::OK,
        views::signup_page(&ctx.template_data()?, &UserSignupForm::default()),
    ))
}

pub async fn user_signup_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    form: Result<Form<UserSignupForm>, FormRejection>,
) -> Result<Response, AppError> {
    let mut form = decode_post_form(form)?;

    form.validator.check_field(validator::not_blank(&form.name), "name", BLANK);
    form.validator.check_field(validator::not_blank(&form.email), "email", BLANK);
    form.validator.check_field(
        validator::matches(&form.email, &EMAIL_RX),
        "email",
        INVALID_EMAIL,
    );
    form.validator.check_field(validator::not_blank(&form.password), "password", BLANK);
    form.validator.check_field(
        validator::min_chars(&form.password, 8),
        "password",
        "This field must be at least 8 characters long",
    );

    if !form.validator.valid() {
        return Ok(render(
            StatusCode::UNPROCESSABLE_ENTITY,
            views::signup_page(&ctx.template_data()?, &form),
        ));
    }

    match state.users.insert(&form.name, &form.email, &form.password).await {
        Ok(()) => {}
        Err(ModelError::DuplicateEmail) => {
            form.validator.add_field_error("email", "Email address is already in use");
            return Ok(render(
                StatusCode::UNPROCESSABLE_ENTITY,
                views::signup_page(&ctx.template_data()?, &form),
            ));
        }
        Err(err) => return Err(err.into()),
    }

    ctx.session.put_flash("Your signup was successful. Please log in.")?;
    Ok(Redirect::to("/user/login").into_response())
}

pub async fn user_login(ctx: RequestContext) -> Result<Response, AppError> {
    Ok(render(
        StatusCode::OK,
        views::login_page(&ctx.template_data()?, &UserLoginForm::default()),
    ))
}

pub async fn user_login_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    form: Result<Form<UserLoginForm>, FormRejection>,
) -> Result<Response, AppError> {
    let mut form = decode_post_form(form)?;

    form.validator.check_field(validator::not_blank(&form.email), "email", BLANK);
    form.validator.check_field(
        validator::matches(&form.email, &EMAIL_RX),
        "email",
        INVALID_EMAIL,
    );
    form.validator.check_field(validator::not_blank(&form.password), "password", BLANK);

    if !form.validator.valid() {
        return Ok(render(
            StatusCode::UNPROCESSABLE_ENTITY,
            views::login_page(&ctx.template_data()?, &form),
        ));
    }

    let id = match state.users.authenticate(&form.email, &form.password).await {
        Ok(id) => id,
        Err(ModelError::InvalidCredentials) => {
            form.validator.add_non_field_error("Email or password is incorrect");
            return Ok(render(
                StatusCode::UNPROCESSABLE_ENTITY,
                views::login_page(&ctx.template_data()?, &form),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    ctx.session.renew_token();
    ctx.session.put_user_id(id)?;
    tracing::info!(user_id = id, "user logged in");

    let target = ctx
        .session
        .pop_redirect_after_login()?
        .filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .unwrap_or_else(|| DEFAULT_AFTER_LOGIN.to_string());

    Ok(Redirect::to(&target).into_response())
}

pub async fn user_logout_post(ctx: RequestContext) -> Result<Response, AppError> {
    ctx.session.renew_token();
    ctx.session.remove_user_id()?;
    ctx.session.put_flash("You've been logged out successfully!")?;

    Ok(Redirect::to("/").into_response())
}

pub async fn ping() -> &'static str {
    "OK"
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
