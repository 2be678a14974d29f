pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		match line.trim().strip_prefix("\\ir ").map(str::trim) {
			Some("tables/001_users.sql") =>
				out.push_str(include_str!("../../../sql/tables/001_users.sql")),
			Some("tables/002_memories.sql") =>
				out.push_str(include_str!("../../../sql/tables/002_memories.sql")),
			_ => out.push_str(line),
		}

		out.push('\n');
	}

	out
}
