/// A page template exercising every kind of directive.
pub const PAGE: &str = r#"@arg user &User
@context title String = String::from("Users")
@import crate::model::User
@func
fn initials(name: &str) -> String {
    name.split_whitespace().filter_map(|w| w.chars().next()).collect()
}
@end
@extend html.layout
  @content head
<title>@= title @</title>
  @end
  @content body
<h1>@= user.name @ (@= initials(&user.name) @)</h1>
@// the friends list
@if user.friends.is_empty()
<p>No friends</p>
@else
<ul>
@for friend in user.friends.iter()
  <li>@= friend.name @, @int= friend.age @ years</li>
@end
</ul>
@end
@include html.footer user
  @end
@end
"#;

/// A template with `n` repetitions of a row of literal text and displays.
pub fn rows(n: usize) -> String {
    let mut s = String::from("@arg rows &[Row]\n<table>\n@for row in rows\n");
    for i in 0..n {
        s.push_str(&format!(
            "<tr><td>{i}</td><td>@= row.name @</td><td>@== row.html @</td><td>@bool= row.ok @</td></tr>\n"
        ));
    }
    s.push_str("@end\n</table>\n");
    s
}
