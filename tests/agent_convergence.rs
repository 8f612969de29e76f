//! Learning behavior of the agent families on small games

mod common;

use nim_rl::{
    agents::{
        DoubleTemporalDifferenceAgent, DpMethod, DynamicProgrammingAgent, NStepAgent, NStepRule,
        OptimalAgent, RandomAgent, TdRule, TemporalDifferenceAgent, optimal_actions_ratio,
    },
    app::{AgentConfig, AgentKind},
    identifiers::Seat,
    learning::EpsilonGreedy,
    nim::State,
    ports::{Agent, lock, share},
};

use common::{play, train, values_of};

#[test]
fn test_value_and_policy_iteration_agree() {
    let initial = State::from([3, 4, 5]);
    let states = initial.all_states();

    let mut vi = DynamicProgrammingAgent::new(DpMethod::ValueIteration);
    let mut pi = DynamicProgrammingAgent::new(DpMethod::PolicyIteration);
    vi.initialize(&states).unwrap();
    pi.initialize(&states).unwrap();

    for state in &states {
        let difference = (vi.value_table().get(state) - pi.value_table().get(state)).abs();
        assert!(difference <= vi.threshold(), "{state}: {difference}");
    }
    assert_eq!(optimal_actions_ratio(vi.value_table(), &states), 1.0);
}

#[test]
fn test_optimal_first_mover_loses_from_zero_nim_sum() {
    let first = share(OptimalAgent::new("first").with_seed(1));
    let second = share(OptimalAgent::new("second").with_seed(2));

    let result = play(&first, &second, State::from([1, 2, 3]), 100);
    assert_eq!(result.second_wins, 100);
    assert_eq!(result.wins(Seat::First), 0);
}

#[test]
fn test_dp_agent_never_loses_a_winning_position() {
    let solver = share(DynamicProgrammingAgent::new(DpMethod::ValueIteration).with_seed(3));
    let random = share(RandomAgent::new("random").with_seed(4));

    let result = play(&solver, &random, State::from([3, 4, 5]), 200);
    assert_eq!(result.first_wins, 200);
}

fn behavior() -> EpsilonGreedy {
    EpsilonGreedy::new(0.3, 0.99, 0.05)
}

#[test]
fn test_one_step_n_step_sarsa_matches_td_sarsa() {
    let td = share(
        TemporalDifferenceAgent::new(TdRule::Sarsa)
            .with_alpha(0.3)
            .with_policy(behavior())
            .with_seed(7),
    );
    let n_step = share(
        NStepAgent::new(NStepRule::Sarsa, 1)
            .with_alpha(0.3)
            .with_policy(behavior())
            .with_seed(7),
    );

    let initial = State::from([2, 3, 4]);
    let opponent = share(RandomAgent::new("random").with_seed(11));
    let td_result = train(&td, &opponent, initial.clone(), 300);
    let opponent = share(RandomAgent::new("random").with_seed(11));
    let n_step_result = train(&n_step, &opponent, initial, 300);

    assert_eq!(td_result.first_wins, n_step_result.first_wins);
    assert_eq!(values_of(&td), values_of(&n_step));
}

#[test]
fn test_one_step_n_step_expected_sarsa_matches_td_expected_sarsa() {
    let td = share(
        TemporalDifferenceAgent::new(TdRule::ExpectedSarsa)
            .with_policy(behavior())
            .with_seed(5),
    );
    let n_step = share(
        NStepAgent::new(NStepRule::ExpectedSarsa, 1)
            .with_policy(behavior())
            .with_seed(5),
    );

    let initial = State::from([1, 3, 4]);
    let opponent = share(RandomAgent::new("random").with_seed(13));
    train(&opponent, &td, initial.clone(), 300);
    let opponent = share(RandomAgent::new("random").with_seed(13));
    train(&opponent, &n_step, initial, 300);

    assert_eq!(values_of(&td), values_of(&n_step));
}

#[test]
fn test_one_step_tree_backup_matches_q_learning() {
    let td = share(
        TemporalDifferenceAgent::new(TdRule::QLearning)
            .with_alpha(0.3)
            .with_policy(behavior())
            .with_seed(7),
    );
    let n_step = share(
        NStepAgent::new(NStepRule::TreeBackup, 1)
            .with_alpha(0.3)
            .with_policy(behavior())
            .with_seed(7),
    );

    let initial = State::from([2, 3, 4]);
    let opponent = share(RandomAgent::new("random").with_seed(11));
    let td_result = train(&td, &opponent, initial.clone(), 300);
    let opponent = share(RandomAgent::new("random").with_seed(11));
    let n_step_result = train(&n_step, &opponent, initial, 300);

    assert_eq!(td_result.first_wins, n_step_result.first_wins);
    assert_eq!(values_of(&td), values_of(&n_step));
}

/// From {1,2} against perfect play every afterstate has a fixed sign:
/// {1,1} and {0,0} win, {0,2} and {0,1} lose.
#[test]
fn test_double_stores_agree_against_perfect_play() {
    let winning = [State::from([1, 1]), State::from([0, 0])];
    for rule in [TdRule::QLearning, TdRule::Sarsa, TdRule::ExpectedSarsa] {
        let agent = share(
            DoubleTemporalDifferenceAgent::new(rule)
                .with_alpha(0.1)
                .with_policy(EpsilonGreedy::new(0.5, 0.99, 0.05))
                .with_seed(51),
        );
        let optimal = share(OptimalAgent::new("optimal").with_seed(52));
        train(&agent, &optimal, State::from([1, 2]), 2_000);

        let guard = lock(&agent).unwrap();
        let double = guard
            .as_any()
            .downcast_ref::<DoubleTemporalDifferenceAgent>()
            .unwrap();
        let (a, b) = double.stores();
        for state in State::from([1, 2]).all_states() {
            let (x, y) = (a.get(&state), b.get(&state));
            assert!(x * y >= 0.0, "{rule}: {state} has values {x} and {y}");
        }
        for state in &winning {
            let (x, y) = (a.get(state), b.get(state));
            assert!(x > 0.99 && y > 0.99, "{rule}: {state} has values {x} and {y}");
            assert!((x - y).abs() < 1e-3, "{rule}: stores drifted at {state}");
        }
        for state in [State::from([0, 2]), State::from([0, 1])] {
            assert!(a.get(&state) <= 0.0 && b.get(&state) <= 0.0, "{rule}: {state}");
        }
    }
}

#[test]
fn test_double_stores_stay_bounded() {
    for rule in [TdRule::QLearning, TdRule::Sarsa, TdRule::ExpectedSarsa] {
        let agent = share(DoubleTemporalDifferenceAgent::new(rule).with_seed(21));
        let opponent = share(RandomAgent::new("random").with_seed(22));
        train(&agent, &opponent, State::from([1, 2, 3]), 1_000);

        let guard = lock(&agent).unwrap();
        let double = guard
            .as_any()
            .downcast_ref::<DoubleTemporalDifferenceAgent>()
            .unwrap();
        let (a, b) = double.stores();
        for (state, value) in a.iter().chain(b.iter()) {
            assert!(
                (-1.0..=1.0).contains(value),
                "{rule}: {state} has value {value}"
            );
        }
        // The behavior table is the average of both stores
        let average = guard.values().unwrap();
        for (state, value) in average.iter() {
            let expected = (a.get(state) + b.get(state)) / 2.0;
            assert!((value - expected).abs() < 1e-12);
        }
    }
}

#[test]
fn test_learners_beat_random_opponent() {
    let initial = State::from([3, 4, 5]);
    for kind in [
        AgentKind::QLearning,
        AgentKind::ExpectedSarsa,
        AgentKind::NStepTreeBackup,
    ] {
        let learner = AgentConfig::new(kind).with_n(2).with_seed(31).build().unwrap();
        let opponent = AgentConfig::new(AgentKind::Random).with_seed(32).build().unwrap();

        train(&learner, &opponent, initial.clone(), 5_000);
        let result = play(&learner, &opponent, initial.clone(), 1_000);
        assert!(
            result.first_win_rate >= 0.7,
            "{kind} won only {:.1}% as first player",
            result.first_win_rate * 100.0
        );
    }
}

#[test]
fn test_self_play_with_two_instances() {
    let config = AgentConfig::new(AgentKind::QLearning).with_seed(41);
    let first = config.build().unwrap();
    let second = config.clone().with_seed(42).build().unwrap();

    let result = train(&first, &second, State::from([1, 2, 3]), 500);
    assert_eq!(result.episodes, 500);

    // Both instances learn from their own seat
    assert!(values_of(&first).iter().any(|(_, value)| *value != 0.0));
    assert!(values_of(&second).iter().any(|(_, value)| *value != 0.0));
}
