//! LITP model and plan helpers
//!
//! Operations that change the model wait for a running plan to finish first,
//! since LITP rejects model changes while a plan executes.

use hardening::{HardenError, TopicContext, wait_until};
use regex::Regex;
use std::sync::LazyLock;

use super::parsers::{self, ModelItem, Plan};

const LITP: &str = "/usr/bin/litp";
const CLUSTERS_PATH: &str = "/deployments/d1/clusters";

static PLAN_MISSING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"InvalidLocationError\s+Plan\s+does\s+not\s+exist").expect("valid plan regex")
});

/// LITP commands run through the shell of the current topic
pub struct Litp<'c, 'a> {
    ctx: &'c mut TopicContext<'a>,
}

impl<'c, 'a> Litp<'c, 'a> {
    pub fn new(ctx: &'c mut TopicContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn model_item(&mut self, path: &str) -> Result<ModelItem, HardenError> {
        let out = self.ctx.shell.run(&format!("{LITP} show -p {path}"))?;
        Ok(parsers::model_item(&out)?)
    }

    /// Every item below `path` (inclusive) of the given type
    pub fn items_by_type(&mut self, path: &str, item_type: &str) -> Result<Vec<ModelItem>, HardenError> {
        let out = self.ctx.shell.run(&format!("{LITP} show -r -p {path}"))?;
        Ok(parsers::model_items(&out)?
            .into_iter()
            .filter(|item| item.item_type() == Some(item_type))
            .collect())
    }

    pub fn clusters(&mut self) -> Result<Vec<ModelItem>, HardenError> {
        let collection = self.model_item(CLUSTERS_PATH)?;
        collection
            .children
            .iter()
            .map(|child| self.model_item(&format!("{CLUSTERS_PATH}{child}")))
            .collect()
    }

    /// The current plan, or `None` when no plan exists
    pub fn plan(&mut self) -> Result<Option<Plan>, HardenError> {
        let out = self
            .ctx
            .shell
            .run_allowing(&format!("{LITP} show_plan"), &[1])?;
        if out.status == 1 {
            let missing = out
                .output
                .lines()
                .rfind(|l| !l.trim().is_empty())
                .is_some_and(|last| PLAN_MISSING.is_match(last));
            if missing {
                return Ok(None);
            }
            return Err(hardening::CommandError::Failed {
                command: format!("{LITP} show_plan"),
                status: out.status,
                output: out.output,
            }
            .into());
        }
        Ok(Some(parsers::plan(&out.output)?))
    }

    pub fn is_plan_finished(&mut self) -> Result<bool, HardenError> {
        Ok(self.plan()?.is_none_or(|plan| plan.is_finished()))
    }

    pub fn remove_item(&mut self, path: &str) -> Result<(), HardenError> {
        self.wait_idle()?;
        self.ctx.shell.run(&format!("{LITP} remove -p {path}"))?;
        Ok(())
    }

    pub fn create_item(
        &mut self,
        item_type: &str,
        path: &str,
        properties: &[(&str, &str)],
    ) -> Result<(), HardenError> {
        self.wait_idle()?;
        let mut cmd = format!("{LITP} create -t {item_type} -p {path}");
        if !properties.is_empty() {
            let pairs: Vec<String> = properties.iter().map(|(k, v)| format!("{k}={v}")).collect();
            cmd.push_str(&format!(" -o {}", pairs.join(" ")));
        }
        self.ctx.shell.run(&cmd)?;
        Ok(())
    }

    pub fn create_plan(&mut self) -> Result<(), HardenError> {
        self.wait_idle()?;
        self.ctx.shell.run(&format!("{LITP} create_plan"))?;
        Ok(())
    }

    pub fn run_plan(&mut self) -> Result<(), HardenError> {
        self.ctx.shell.run(&format!("{LITP} run_plan"))?;
        Ok(())
    }

    /// Create and run a plan, then wait for it. A failed plan is a stop condition.
    pub fn apply_plan(&mut self, what: &str) -> Result<(), HardenError> {
        self.create_plan()?;
        self.run_plan()?;
        let plan = self.wait_plan()?;
        if plan.is_failed() {
            return Err(HardenError::stop(format!("{what} plan failed")));
        }
        Ok(())
    }

    /// Poll the running plan until it finishes
    pub fn wait_plan(&mut self) -> Result<Plan, HardenError> {
        let poll = self.ctx.poll;
        let mut finished = None;
        wait_until(&poll, "LITP run plan", || match self.plan()? {
            Some(plan) if plan.is_finished() => {
                finished = Some(plan);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(HardenError::stop("LITP plan disappeared while running")),
        })?;
        finished.ok_or_else(|| HardenError::stop("LITP plan disappeared while running"))
    }

    fn wait_idle(&mut self) -> Result<(), HardenError> {
        if !self.is_plan_finished()? {
            log::info!("Waiting for the running LITP plan to finish");
            self.wait_plan()?;
        }
        Ok(())
    }
}
