//! Server-side rendering of the product workflow detail page with Tera.
//!
//! The template is compiled into the binary and parsed once at startup.

use serde::Serialize;
use tera::{Context, Tera};

use crate::{workflow::ProductWorkflowDetail, Result};

const DETAIL_TEMPLATE_NAME: &str = "detail.html";
const DETAIL_TEMPLATE: &str = include_str!("../templates/detail.html");

/// One transition row of the detail table.
#[derive(Debug, Serialize)]
struct TransitionRow<'a> {
    from_step: &'a str,
    to_step: &'a str,
    condition: Option<&'a str>,
    available: bool,
}

pub struct DetailRenderer {
    tera: Tera,
}

impl DetailRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        // .html template names are autoescaped
        tera.add_raw_template(DETAIL_TEMPLATE_NAME, DETAIL_TEMPLATE)?;
        Ok(Self { tera })
    }

    pub fn render(&self, detail: &ProductWorkflowDetail) -> Result<String> {
        let transitions: Vec<TransitionRow<'_>> = detail
            .transitions
            .iter()
            .map(|transition| TransitionRow {
                from_step: &transition.from_step_name,
                to_step: &transition.to_step_name,
                condition: transition.condition.as_deref(),
                available: detail
                    .available_transitions
                    .iter()
                    .any(|t| t.id == transition.id),
            })
            .collect();

        let mut context = Context::new();
        context.insert("label", &detail.label);
        context.insert("product", &detail.product);
        context.insert("workflow", &detail.workflow);
        context.insert("steps", &detail.steps);
        context.insert("transitions", &transitions);
        context.insert("current_step", detail.product_workflow.current_step_label());
        context.insert("current_step_id", &detail.product_workflow.current_step_id);

        Ok(self.tera.render(DETAIL_TEMPLATE_NAME, &context)?)
    }
}
