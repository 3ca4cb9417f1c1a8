//! Chat session bookkeeping and the credential gate.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{encyclopedia, options, CountingFactory, FailingLlm, ScriptedLlm, ANSWER_REPLY, LOOKUP_REPLY};
use research_chat::agent::{event_channel, Agent, AgentEvent, StopReason};
use research_chat::conversation::{Role, GREETING};
use research_chat::session::{ChatSession, MissingCredential, SubmitOutcome};

fn answering_session() -> (ChatSession, Arc<std::sync::atomic::AtomicUsize>) {
    let (factory, builds) = CountingFactory::new(|| {
        let llm = ScriptedLlm::new(&[LOOKUP_REPLY, ANSWER_REPLY], "Final Answer: unused");
        let (tools, _) = encyclopedia();
        Agent::new(llm, tools, options(5))
    });
    let mut session = ChatSession::new(factory);
    session.set_groq_api_key("gsk-test");
    session.set_tavily_api_key("tvly-test");
    (session, builds)
}

#[tokio::test]
async fn n_prompts_produce_two_n_plus_one_turns() {
    let (mut session, builds) = answering_session();
    let prompts = ["first question", "second question", "third question"];

    for prompt in prompts {
        let outcome = session.submit(prompt, None).await;
        assert!(matches!(outcome, SubmitOutcome::Answered { .. }));
    }

    let turns = session.conversation().all();
    assert_eq!(turns.len(), 2 * prompts.len() + 1);
    assert_eq!(builds.load(Ordering::SeqCst), prompts.len());

    assert_eq!(turns[0].role(), Role::Assistant);
    assert_eq!(turns[0].content(), GREETING);
    for (i, prompt) in prompts.iter().enumerate() {
        let user = &turns[1 + 2 * i];
        let assistant = &turns[2 + 2 * i];
        assert_eq!(user.role(), Role::User);
        assert_eq!(user.content(), *prompt);
        assert_eq!(assistant.role(), Role::Assistant);
    }
    assert!(turns.windows(2).all(|w| w[0].created_at() <= w[1].created_at()));
}

#[tokio::test]
async fn capital_of_france_grows_the_conversation_by_two() {
    let (mut session, _) = answering_session();
    let before = session.conversation().len();

    let outcome = session.submit("What is the capital of France?", None).await;

    match outcome {
        SubmitOutcome::Answered { answer, stop_reason } => {
            assert!(answer.contains("Paris"));
            assert_eq!(stop_reason, StopReason::FinalAnswer);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(session.conversation().len(), before + 2);
    let last = session.conversation().last().expect("assistant turn");
    assert_eq!(last.role(), Role::Assistant);
    assert!(last.content().contains("Paris"));
}

#[tokio::test]
async fn empty_groq_key_warns_and_leaves_history_alone() {
    let (factory, builds) = CountingFactory::new(|| {
        let (tools, _) = encyclopedia();
        Agent::new(Arc::new(FailingLlm), tools, options(5))
    });
    let mut session = ChatSession::new(factory);
    session.set_groq_api_key("");
    session.set_tavily_api_key("tvly-test");

    let (tx, mut rx) = event_channel();
    let outcome = session.submit("What is the capital of France?", Some(tx)).await;

    assert_eq!(outcome, SubmitOutcome::Warning(MissingCredential::Groq));
    assert_eq!(
        MissingCredential::Groq.warning(),
        "Please enter your Groq API key."
    );
    assert_eq!(session.conversation().len(), 1);
    assert_eq!(builds.load(Ordering::SeqCst), 0);
    assert!(rx.recv().await.is_none(), "no agent events without credentials");
}

#[tokio::test]
async fn missing_tavily_key_is_reported_once_groq_is_set() {
    let (mut session, builds) = answering_session();
    session.set_tavily_api_key("   ");

    let outcome = session.submit("Anything", None).await;

    assert_eq!(outcome, SubmitOutcome::Warning(MissingCredential::Tavily));
    assert_eq!(session.conversation().len(), 1);
    assert_eq!(builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn blank_prompts_are_ignored() {
    let (mut session, builds) = answering_session();
    assert_eq!(session.submit("   ", None).await, SubmitOutcome::Ignored);
    assert_eq!(session.conversation().len(), 1);
    assert_eq!(builds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_failures_still_record_an_assistant_turn() {
    let (factory, _) = CountingFactory::new(|| {
        let (tools, _) = encyclopedia();
        Agent::new(Arc::new(FailingLlm), tools, options(5))
    });
    let mut session = ChatSession::new(factory);
    session.set_groq_api_key("gsk-bad");
    session.set_tavily_api_key("tvly-test");

    let outcome = session.submit("Hello?", None).await;

    match outcome {
        SubmitOutcome::Failed { message } => assert!(message.contains("API key")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(session.conversation().len(), 3);
    let last = session.conversation().last().expect("assistant turn");
    assert_eq!(last.role(), Role::Assistant);
    assert!(last.content().starts_with("Sorry, I couldn't complete that request"));

    // The session keeps accepting prompts afterwards.
    session.submit("Again?", None).await;
    assert_eq!(session.conversation().len(), 5);
}

#[tokio::test]
async fn events_channel_closes_when_submit_returns() {
    let (mut session, _) = answering_session();
    let (tx, mut rx) = event_channel();

    session.submit("What is the capital of France?", Some(tx)).await;

    let mut saw_answer = false;
    while let Some(event) = rx.recv().await {
        if let AgentEvent::FinalAnswer { content } = event {
            saw_answer = content.contains("Paris");
        }
    }
    assert!(saw_answer);
}

#[tokio::test]
async fn accepted_prompt_is_recorded_before_the_agent_runs() {
    let (mut session, builds) = answering_session();

    let accepted = session
        .accept("  What is the capital of France?  ")
        .expect("credentials are set");

    // The user turn is visible while the agent has not been built yet.
    assert_eq!(session.conversation().len(), 2);
    let last = session.conversation().last().expect("user turn");
    assert_eq!(last.role(), Role::User);
    assert_eq!(last.content(), "What is the capital of France?");
    assert_eq!(builds.load(Ordering::SeqCst), 0);

    let outcome = session.answer(accepted, None).await;

    assert!(matches!(outcome, SubmitOutcome::Answered { .. }));
    assert_eq!(session.conversation().len(), 3);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(
        session.conversation().last().map(|t| t.role()),
        Some(Role::Assistant)
    );
}

#[tokio::test]
async fn rejected_prompts_are_not_recorded() {
    let (mut session, _) = answering_session();
    session.set_groq_api_key(" ");

    let err = session.accept("Hello?").expect_err("groq key missing");
    assert_eq!(err, SubmitOutcome::Warning(MissingCredential::Groq));
    assert_eq!(session.accept("   ").expect_err("blank"), SubmitOutcome::Ignored);
    assert_eq!(session.conversation().len(), 1);
}
