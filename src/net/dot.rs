//! Graphviz 导出：库所标签携带当前标识下的令牌数。
use std::fmt::Write as FmtWrite;

use crate::net::Net;
use crate::net::marking::Marking;
use crate::net::structure::ArcDirection;

pub fn token_label(count: u64) -> String {
    if count == 1 {
        format!("{} token", count)
    } else {
        format!("{} tokens", count)
    }
}

pub fn to_dot(net: &Net, marking: &Marking) -> String {
    let mut dot = String::new();
    let _ = writeln!(&mut dot, "digraph PetriNet {{");
    let _ = writeln!(&mut dot, "    rankdir=LR;");

    for (place_id, place) in net.places().iter_enumerated() {
        let _ = writeln!(
            &mut dot,
            "    \"{}\" [label=\"{} ({})\", shape=circle];",
            place_id,
            escape_label(&place.name),
            token_label(marking.count(place_id))
        );
    }

    for (transition_id, transition) in net.transitions().iter_enumerated() {
        let peripheries = if transition.terminal { 2 } else { 1 };
        let _ = writeln!(
            &mut dot,
            "    \"{}\" [label=\"{}\", shape=box, peripheries={}];",
            transition_id,
            escape_label(&transition.name),
            peripheries
        );
    }

    for arc in net.arcs().iter() {
        let (source, target) = match arc.direction() {
            ArcDirection::PlaceToTransition => {
                (arc.place().to_string(), arc.transition().to_string())
            }
            ArcDirection::TransitionToPlace => {
                (arc.transition().to_string(), arc.place().to_string())
            }
        };
        let _ = writeln!(
            &mut dot,
            "    \"{}\" -> \"{}\" [label=\"{}\"];",
            source,
            target,
            arc.weight()
        );
    }

    let _ = writeln!(&mut dot, "}}");
    dot
}

fn escape_label(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NetBuilder;

    #[test]
    fn token_label_pluralizes() {
        assert_eq!(token_label(0), "0 tokens");
        assert_eq!(token_label(1), "1 token");
        assert_eq!(token_label(2), "2 tokens");
    }

    #[test]
    fn dot_renders_places_transitions_and_weights() {
        let mut builder = NetBuilder::new();
        let p = builder.place("start \"a\"", 1).unwrap();
        let q = builder.place("end", 0).unwrap();
        let t = builder.terminal_transition("go").unwrap();
        builder.input(p, t, 1).unwrap();
        builder.output(t, q, 3).unwrap();
        let net = builder.build();

        let dot = net.to_dot(&net.initial_marking());
        assert!(dot.contains(r#""p_0" [label="start \"a\" (1 token)", shape=circle];"#));
        assert!(dot.contains(r#""p_1" [label="end (0 tokens)", shape=circle];"#));
        assert!(dot.contains(r#""t_0" [label="go", shape=box, peripheries=2];"#));
        assert!(dot.contains(r#""p_0" -> "t_0" [label="1"];"#));
        assert!(dot.contains(r#""t_0" -> "p_1" [label="3"];"#));
    }
}
