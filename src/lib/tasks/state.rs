use std::collections::HashMap;

use super::types::State;

pub fn valid_state_transition(src: &State, dst: &State) -> bool {
    let state_transition_map: HashMap<State, Vec<State>> = {
        let mut map = HashMap::new();
        map.insert(
            State::Pending,
            vec![
                State::Started,
                State::Succeeded,
                State::Failed,
                State::Abandoned,
            ],
        );
        map.insert(
            State::Started,
            vec![State::Succeeded, State::Failed, State::Abandoned],
        );
        map.insert(State::Succeeded, vec![]);
        map.insert(State::Failed, vec![]);
        map.insert(State::Abandoned, vec![]);
        map
    };

    if let Some(valid_states) = state_transition_map.get(src) {
        valid_states.contains(dst)
    } else {
        false
    }
}
