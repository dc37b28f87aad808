//! Built-in fallback documents.
//!
//! One handlebars template per known component type plus a generic one.
//! Rendering never fails: missing or blank context fields get defaults,
//! and a template error falls back to a plain-text document.

use std::collections::HashMap;

use handlebars::Handlebars;

const GENERIC: &str = "generic";

const AVATAR: &str = "\
# Customer Avatar: {{audience}}

Profile prepared for {{product}} in {{niche}}.

## Who they are
- Role: {{audience}} actively looking for a better way to get results in {{niche}}
- Situation: already tried at least one alternative to {{product}}
- Buying trigger: a concrete, recent problem they want gone

## Pains
1. Time lost on approaches that do not fit {{niche}}
2. Uncertainty about which option is worth paying for
3. Pressure to show results quickly

## Desires
- Clear steps they can apply this week
- Proof that {{product}} works for people like them

## Next steps
- Interview five members of {{audience}}
- Replace this profile with the findings
";

const MENTAL_DRIVERS: &str = "\
# Mental Drivers for {{product}}

Persuasion levers for {{audience}} in {{niche}}.

1. **Urgency**: the cost of waiting is paid every day the problem stays unsolved.
2. **Social proof**: others in {{niche}} already moved.
3. **Authority**: {{product}} is built on methods that worked for {{audience}}.
4. **Reciprocity**: give one useful result before asking for the sale.
5. **Belonging**: buyers join a group of peers with the same goal.

## How to use them
- Pick two drivers per piece of content
- Tie every driver to a concrete outcome
";

const ANTI_OBJECTION: &str = "\
# Objection Handling for {{product}}

Common objections from {{audience}} and direct answers.

| Objection | Answer |
|---|---|
| It is too expensive | Compare the price with the cost of the problem in {{niche}}. |
| I have no time | Start with the shortest path to the first result. |
| It will not work for me | Show cases from {{audience}} with the same starting point. |
| I will do it later | Make the cost of delay explicit. |

## Next steps
- Collect the real objections from sales calls
- Rewrite each answer with a customer quote
";

const COMPETITION: &str = "\
# Competitive Landscape: {{niche}}

Positioning of {{product}} for {{audience}}.

## Competitor groups
1. Direct alternatives sold to {{audience}}
2. Do-it-yourself approaches and free content
3. Doing nothing and accepting the problem

## Differentiation
- Specific promise: a named result for {{audience}}
- Proof: measurable outcomes instead of generic claims
- Support: guidance that continues after the purchase

## Next steps
- List the three strongest competitors by name
- Record their price, promise and guarantee
";

const SALES_FUNNEL: &str = "\
# Sales Funnel for {{product}}

Stages for reaching {{audience}} in {{niche}}.

1. **Attract**: content that names the core problem of {{audience}}.
2. **Capture**: a free resource in exchange for contact details.
3. **Nurture**: a short sequence that proves the method.
4. **Convert**: an offer for {{product}} with a clear deadline.
5. **Retain**: onboarding that delivers the first result fast.

## Metrics to track
- Visitor to lead rate
- Lead to customer rate
- Time to first result
";

const ANALYSIS: &str = "\
# Market Analysis: {{product}}

Summary for {{niche}}, focused on {{audience}}.

## Key points
1. **Specific analysis** for the {{niche}} segment
2. **Audience focus** on {{audience}}
3. **Tailored strategies** for {{product}}
4. **Practical implementation** based on collected data

## Recommendations
- Build strategies specific to {{niche}}
- Address the needs of {{audience}} first
- Monitor the metrics that matter
- Adjust the approach as results come in

## Next steps
1. Review the detailed analysis
2. Apply the recommendations
3. Monitor results
4. Iterate on feedback
";

const GENERIC_TEMPLATE: &str = "\
# {{component}}

Prepared for {{product}} in {{niche}}, aimed at {{audience}}.

## Summary
This section was produced from a standard outline because no generated
content was available.

## Key points
1. Focus on what {{audience}} needs most
2. Keep the message specific to {{niche}}
3. Connect every claim to {{product}}

## Next steps
- Regenerate this section when a backend is available
- Review and adapt the outline before publishing
";

/// Renders emergency output per component type.
#[derive(Debug)]
pub struct EmergencyTemplates {
    registry: Handlebars<'static>,
}

impl EmergencyTemplates {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        let builtins = [
            ("avatar", AVATAR),
            ("mental_drivers", MENTAL_DRIVERS),
            ("anti_objection", ANTI_OBJECTION),
            ("competition", COMPETITION),
            ("sales_funnel", SALES_FUNNEL),
            ("analysis", ANALYSIS),
            (GENERIC, GENERIC_TEMPLATE),
        ];
        for (name, source) in builtins {
            if let Err(e) = registry.register_template_string(name, source) {
                tracing::error!(template = name, error = %e, "Invalid emergency template");
            }
        }

        Self { registry }
    }

    /// Whether `component_type` has its own template.
    pub fn has_template(&self, component_type: &str) -> bool {
        component_type != GENERIC && self.registry.has_template(component_type)
    }

    pub fn render(&self, component_type: &str, context: &HashMap<String, String>) -> String {
        let fields = fill_defaults(component_type, context);
        let name = if self.registry.has_template(component_type) {
            component_type
        } else {
            GENERIC
        };

        match self.registry.render(name, &fields) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => plain_fallback(&fields),
            Err(e) => {
                tracing::warn!(template = name, error = %e, "Emergency template failed, using plain text");
                plain_fallback(&fields)
            }
        }
    }
}

impl Default for EmergencyTemplates {
    fn default() -> Self {
        Self::new()
    }
}

fn fill_defaults(component_type: &str, context: &HashMap<String, String>) -> HashMap<String, String> {
    let mut fields: HashMap<String, String> = context
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let defaults = [
        ("product", "the product".to_string()),
        ("niche", "the target market".to_string()),
        ("audience", "the target audience".to_string()),
        ("component", humanize(component_type)),
    ];
    for (key, value) in defaults {
        fields.entry(key.to_string()).or_insert(value);
    }
    fields
}

fn plain_fallback(fields: &HashMap<String, String>) -> String {
    let get = |key: &str| fields.get(key).map(String::as_str).unwrap_or_default();
    format!(
        "# {}\n\nPrepared for {} in {}, aimed at {}.\n",
        get("component"),
        get("product"),
        get("niche"),
        get("audience"),
    )
}

/// `sales_funnel` → `Sales Funnel`.
pub fn humanize(component_type: &str) -> String {
    let words: Vec<String> = component_type
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "Report".to_string()
    } else {
        words.join(" ")
    }
}
