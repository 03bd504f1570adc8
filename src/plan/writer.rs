use std::io::Write;

use chrono::Utc;

use crate::error::Result;
use crate::model::{CollectionNamespace, ShardKey, TagId};

/// Receiver of plan commands.
pub trait CommandPlanSink {
    fn comment(&mut self, text: &str) -> Result<()>;

    fn add_tag_range(
        &mut self,
        namespace: &CollectionNamespace,
        min: &ShardKey,
        max: &ShardKey,
        tag: &TagId,
    ) -> Result<()>;

    fn remove_tag_range(
        &mut self,
        namespace: &CollectionNamespace,
        min: &ShardKey,
        max: &ShardKey,
        tag: &TagId,
    ) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

/// Writes the plan as a mongo-shell script.
#[derive(Debug)]
pub struct CommandPlanWriter<W: Write> {
    writer: W,
}

impl<W: Write> CommandPlanWriter<W> {
    /// Wrap `writer` and emit the header comments.
    pub fn new(writer: W) -> Result<Self> {
        let mut plan = Self { writer };
        plan.comment(&format!(
            "date: {}",
            Utc::now().format("%Y-%m-%d %H:%M:%SZ")
        ))?;
        Ok(plan)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn tag_range_command(
        &mut self,
        command: &str,
        namespace: &CollectionNamespace,
        min: &ShardKey,
        max: &ShardKey,
        tag: &TagId,
    ) -> Result<()> {
        writeln!(
            self.writer,
            "sh.{command}( \"{}\", {min}, {max}, \"{tag}\");",
            namespace.full_name()
        )?;
        Ok(())
    }
}

impl<W: Write> CommandPlanSink for CommandPlanWriter<W> {
    fn comment(&mut self, text: &str) -> Result<()> {
        writeln!(self.writer, "// {text}")?;
        Ok(())
    }

    fn add_tag_range(
        &mut self,
        namespace: &CollectionNamespace,
        min: &ShardKey,
        max: &ShardKey,
        tag: &TagId,
    ) -> Result<()> {
        self.tag_range_command("addTagRange", namespace, min, max, tag)
    }

    fn remove_tag_range(
        &mut self,
        namespace: &CollectionNamespace,
        min: &ShardKey,
        max: &ShardKey,
        tag: &TagId,
    ) -> Result<()> {
        self.tag_range_command("removeTagRange", namespace, min, max, tag)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyValue;

    #[test]
    fn test_script_lines() {
        let mut plan = CommandPlanWriter::new(Vec::new()).unwrap();
        let ns = CollectionNamespace::new("db", "users");
        plan.comment("change tags").unwrap();
        plan.remove_tag_range(
            &ns,
            &ShardKey::min_key("_id"),
            &ShardKey::single("_id", KeyValue::Number(10)),
            &TagId::new("a"),
        )
        .unwrap();
        plan.add_tag_range(
            &ns,
            &ShardKey::min_key("_id"),
            &ShardKey::single("_id", KeyValue::Number(12)),
            &TagId::new("a"),
        )
        .unwrap();
        plan.flush().unwrap();

        let text = String::from_utf8(plan.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("// date: "));
        assert_eq!(lines[1], "// change tags");
        assert_eq!(
            lines[2],
            r#"sh.removeTagRange( "db.users", { "_id" : MinKey }, { "_id" : 10 }, "a");"#
        );
        assert_eq!(
            lines[3],
            r#"sh.addTagRange( "db.users", { "_id" : MinKey }, { "_id" : 12 }, "a");"#
        );
    }
}
