//! HTML pages
//!
//! Templates are compiled into the binary and parsed once at startup.

use axum::response::Html;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to load templates: {0}")]
    Load(#[source] tera::Error),

    #[error("failed to render {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },
}

/// Parsed page templates
pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", BASE_TEMPLATE),
            ("index.html", INDEX_TEMPLATE),
            ("admin.html", ADMIN_TEMPLATE),
            ("admin_registrations.html", ADMIN_REGISTRATIONS_TEMPLATE),
            ("services_form.html", SERVICES_FORM_TEMPLATE),
            ("service_created.html", SERVICE_CREATED_TEMPLATE),
            ("concierge.html", CONCIERGE_TEMPLATE),
            ("request.html", REQUEST_TEMPLATE),
            ("b2b.html", B2B_TEMPLATE),
        ])
        .map_err(TemplateError::Load)?;

        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<Html<String>, TemplateError> {
        self.tera
            .render(name, context)
            .map(Html)
            .map_err(|source| TemplateError::Render {
                name: name.to_string(),
                source,
            })
    }
}

const BASE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{% block title %}Concierge{% endblock %}</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif; margin: 0; color: #1d1d1f; }
        header { padding: 16px 32px; border-bottom: 1px solid #e5e5e5; display: flex; justify-content: space-between; align-items: center; }
        main { max-width: 960px; margin: 32px auto; padding: 0 32px; }
        table { width: 100%; border-collapse: collapse; }
        th, td { text-align: left; padding: 8px; border-bottom: 1px solid #eee; }
        form.stack label { display: block; margin-top: 12px; }
        .muted { color: #86868b; }
    </style>
</head>
<body>
    <header>
        <a href="/"><strong>Concierge</strong></a>
        {% if user %}
        <form method="post" action="/logout">
            <span class="muted">{{ user.first_name }} {{ user.last_name }}</span>
            <button type="submit">Log out</button>
        </form>
        {% endif %}
    </header>
    <main>
        {% block content %}{% endblock %}
    </main>
</body>
</html>
"##;

const INDEX_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block content %}
<h1>Concierge service for your business</h1>

<section>
    <h2>Sign in</h2>
    <form class="stack" method="post" action="/login">
        <label>Email <input type="email" name="email" required></label>
        <label>Password <input type="password" name="password" required></label>
        <button type="submit">Sign in</button>
    </form>
</section>

<section>
    <h2>Become a client</h2>
    <form class="stack" method="post" action="/registration">
        <label>Company <input type="text" name="company_name" required></label>
        <label>Email <input type="email" name="email" required></label>
        <label>Phone <input type="tel" name="phone_number" required></label>
        <button type="submit">Send</button>
    </form>
    {% if submitted %}<p class="muted">Thank you, we will contact you shortly.</p>{% endif %}
</section>
{% endblock %}
"##;

const ADMIN_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Admin cabinet{% endblock %}
{% block content %}
<h1>Admin cabinet</h1>
<ul>
    <li><a href="/my-cabinet-admin/registrations">Registration requests</a></li>
    <li><a href="/my-cabinet-admin/services">Add a service</a></li>
</ul>

<h2>Users</h2>
<table>
    <tr><th>ID</th><th>Name</th><th>Email</th><th>Type</th><th>Activated</th></tr>
    {% for u in users %}
    <tr>
        <td>{{ u.id }}</td>
        <td>{{ u.first_name }} {{ u.last_name }}</td>
        <td>{{ u.email }}</td>
        <td>{{ u.user_type }}</td>
        <td>{% if u.activated %}yes{% else %}no{% endif %}</td>
    </tr>
    {% endfor %}
</table>
{% endblock %}
"##;

const ADMIN_REGISTRATIONS_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Registration requests{% endblock %}
{% block content %}
<h1>Registration requests</h1>
{% if forms | length == 0 %}
<p class="muted">No requests yet.</p>
{% else %}
<table>
    <tr><th>Received</th><th>Company</th><th>Email</th><th>Phone</th></tr>
    {% for form in forms %}
    <tr>
        <td>{{ form.created_at }}</td>
        <td>{{ form.company_name }}</td>
        <td>{{ form.email }}</td>
        <td>{{ form.phone_number }}</td>
    </tr>
    {% endfor %}
</table>
{% endif %}
{% endblock %}
"##;

const SERVICES_FORM_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Add a service{% endblock %}
{% block content %}
<h1>Add a service</h1>
<form class="stack" method="post" action="{{ action }}">
    <label>Name <input type="text" name="name" required></label>
    <label>Description <textarea name="description"></textarea></label>
    <label>Type <input type="text" name="service_type" required></label>
    <label>Company
        <select name="company_id">
            {% for company in companies %}
            <option value="{{ company.id }}">{{ company.name }}</option>
            {% endfor %}
        </select>
    </label>
    <fieldset>
        <legend>Prices</legend>
        {% for user_type in price_user_types %}
        <label>{{ user_type }}
            <input type="hidden" name="user_type" value="{{ user_type }}">
            <input type="number" name="price" min="0">
        </label>
        {% endfor %}
    </fieldset>
    <button type="submit">Save</button>
</form>
{% endblock %}
"##;

const SERVICE_CREATED_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Service saved{% endblock %}
{% block content %}
<h1>{{ service.name }}</h1>
<p>{{ service.description }}</p>
<p class="muted">Type: {{ service.type }}</p>
<table>
    <tr><th>Client type</th><th>Price</th></tr>
    {% for price in prices %}
    <tr><td>{{ price.user_type }}</td><td>{{ price.amount }}</td></tr>
    {% endfor %}
</table>
<p><a href="{{ back }}">Back</a></p>
{% endblock %}
"##;

const CONCIERGE_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Concierge desk{% endblock %}
{% block content %}
<h1>Concierge desk</h1>
<ul>
    <li><a href="/my-cabinet/services">Add a service</a></li>
</ul>
<h2>Companies</h2>
<ul>
    {% for company in companies %}
    <li>{{ company.code }} · {{ company.full_name }}</li>
    {% endfor %}
</ul>
{% endblock %}
"##;

const REQUEST_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Request #{{ request.id }}{% endblock %}
{% block content %}
<h1>Request #{{ request.id }}</h1>
<p class="muted">{{ request.type }} · {{ request.status }}</p>
<p>{{ request.description }}</p>
<p class="muted">Client {{ request.client_id }}, received {{ request.created_at }}</p>
{% endblock %}
"##;

const B2B_TEMPLATE: &str = r##"{% extends "base.html" %}
{% block title %}Business cabinet{% endblock %}
{% block content %}
<h1>Business cabinet</h1>
<h2>Your requests</h2>
{% if requests | length == 0 %}
<p class="muted">No requests yet.</p>
{% else %}
<ul>
    {% for request in requests %}
    <li>#{{ request.id }} {{ request.type }} · {{ request.status }}</li>
    {% endfor %}
</ul>
{% endif %}
{% endblock %}
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_parse() {
        Templates::new().unwrap();
    }

    #[test]
    fn test_index_renders_without_user() {
        let templates = Templates::new().unwrap();
        let Html(body) = templates.render("index.html", &Context::new()).unwrap();
        assert!(body.contains("action=\"/login\""));
        assert!(!body.contains("Log out"));
    }

    #[test]
    fn test_unknown_template_is_render_error() {
        let templates = Templates::new().unwrap();
        let result = templates.render("missing.html", &Context::new());
        assert!(matches!(result, Err(TemplateError::Render { .. })));
    }
}
