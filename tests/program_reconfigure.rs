//! Live reconfiguration of a program: growing and shrinking the worker
//! set, restart-on-change semantics and orderly teardown.

#![cfg(unix)]

mod common;

use common::{eventually, test_config, test_config_with, LONG, SHORT};
use procmgrd::domain::{DomainError, ProcessState};
use procmgrd::supervision::{ProcessCommand, ProgramHandle};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn running_pids(program: &ProgramHandle) -> Vec<Option<u32>> {
    let mut pids = Vec::new();
    for process in program.sorted_processes().await.unwrap() {
        pids.push(process.pid().await.unwrap());
    }
    pids
}

#[tokio::test]
async fn test_worker_count_follows_numprocs() {
    let scope = CancellationToken::new();
    let config = test_config_with("pool", "/bin/sleep 100", |c| c.numprocs = 2);
    let program = ProgramHandle::spawn(config.clone(), &scope);
    program.start().await.unwrap();

    eventually(SHORT, "both workers running", || async {
        program.state().await.unwrap() == ProcessState::Running
            && running_pids(&program).await.iter().all(|p| p.is_some())
    })
    .await;
    assert_eq!(program.sorted_processes().await.unwrap().len(), 2);

    // grow to 3: the new worker autostarts
    let mut grown = config.clone();
    grown.numprocs = 3;
    program.set_config(grown).await.unwrap();

    eventually(SHORT, "third worker", || async {
        let processes = program.sorted_processes().await.unwrap();
        processes.len() == 3 && running_pids(&program).await.iter().all(|p| p.is_some())
    })
    .await;

    let ids: Vec<String> = program
        .sorted_processes()
        .await
        .unwrap()
        .iter()
        .map(|p| p.id().to_string())
        .collect();
    assert_eq!(ids, vec!["pool_1", "pool_2", "pool_3"]);

    // shrink to 1: workers 2 and 3 stop and disappear, worker 1 untouched
    let pid_1 = running_pids(&program).await[0];
    let mut shrunk = config.clone();
    shrunk.numprocs = 1;
    program.set_config(shrunk).await.unwrap();

    eventually(LONG, "surplus workers to be removed", || async {
        program.sorted_processes().await.unwrap().len() == 1
    })
    .await;

    let remaining = program.sorted_processes().await.unwrap();
    assert_eq!(remaining[0].id(), "pool_1");
    assert_eq!(running_pids(&program).await[0], pid_1, "worker 1 untouched");

    scope.cancel();
}

#[tokio::test]
async fn test_grown_workers_do_not_autostart_when_disabled() {
    let scope = CancellationToken::new();
    let config = test_config_with("lazy", "/bin/sleep 100", |c| {
        c.numprocs = 1;
        c.autostart = false;
    });
    let program = ProgramHandle::spawn(config.clone(), &scope);

    let mut grown = config.clone();
    grown.numprocs = 2;
    program.set_config(grown).await.unwrap();

    eventually(SHORT, "second worker to appear", || async {
        program.sorted_processes().await.unwrap().len() == 2
    })
    .await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(program.state().await.unwrap(), ProcessState::Stopped);

    scope.cancel();
}

#[tokio::test]
async fn test_unchanged_spawn_attributes_preserve_pids() {
    let scope = CancellationToken::new();
    let config = test_config_with("stable", "/bin/sleep 100", |c| c.numprocs = 2);
    let program = ProgramHandle::spawn(config.clone(), &scope);
    program.start().await.unwrap();

    eventually(SHORT, "workers running", || async {
        running_pids(&program).await.iter().all(|p| p.is_some())
    })
    .await;
    let before = running_pids(&program).await;

    // same spawn-time attributes, different policy fields: no restart
    let mut tweaked = config.clone();
    tweaked.startretries = 11;
    tweaked.stoptime = 7;
    program.set_config(tweaked).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(running_pids(&program).await, before);

    scope.cancel();
}

#[tokio::test]
async fn test_changed_environment_forces_restart() {
    let scope = CancellationToken::new();
    let config = test_config("refreshed", "/bin/sleep 100");
    let program = ProgramHandle::spawn(config.clone(), &scope);
    program.start().await.unwrap();

    eventually(SHORT, "worker running", || async {
        running_pids(&program).await[0].is_some()
    })
    .await;
    let old_pid = running_pids(&program).await[0].unwrap();

    let mut changed = config.clone();
    changed.env.insert("RELOADED".to_string(), "1".to_string());
    program.set_config(changed).await.unwrap();

    eventually(LONG, "worker to be relaunched", || async {
        matches!(running_pids(&program).await[0], Some(pid) if pid != old_pid)
    })
    .await;

    scope.cancel();
}

#[tokio::test]
async fn test_per_process_commands_address_one_worker() {
    let scope = CancellationToken::new();
    let config = test_config_with("targeted", "/bin/sleep 100", |c| {
        c.numprocs = 2;
        c.autostart = false;
    });
    let program = ProgramHandle::spawn(config, &scope);

    program
        .process_command("targeted_2", ProcessCommand::Start)
        .await
        .unwrap();

    eventually(SHORT, "only worker 2 to run", || async {
        let pids = running_pids(&program).await;
        pids[0].is_none() && pids[1].is_some()
    })
    .await;

    let err = program
        .process_command("targeted_9", ProcessCommand::Start)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ProcessNotFound(_)));

    scope.cancel();
}

#[tokio::test]
async fn test_stop_and_wait_tears_the_program_down() {
    let scope = CancellationToken::new();
    let config = test_config_with("ending", "/bin/sleep 100", |c| c.numprocs = 2);
    let program = ProgramHandle::spawn(config, &scope);
    program.start().await.unwrap();

    eventually(SHORT, "workers running", || async {
        running_pids(&program).await.iter().all(|p| p.is_some())
    })
    .await;

    program.stop_and_wait().await.unwrap();

    // the program scope is cancelled: the inbox is gone
    let err = program.config().await.unwrap_err();
    assert!(matches!(err, DomainError::ChannelClosed));
}

#[tokio::test]
async fn test_restart_all_replaces_every_pid() {
    let scope = CancellationToken::new();
    let config = test_config_with("fleet", "/bin/sleep 100", |c| c.numprocs = 3);
    let program = ProgramHandle::spawn(config, &scope);
    program.start().await.unwrap();

    eventually(SHORT, "fleet running", || async {
        running_pids(&program).await.iter().all(|p| p.is_some())
    })
    .await;
    let before: HashSet<u32> = running_pids(&program).await.into_iter().flatten().collect();

    program.restart().await.unwrap();

    eventually(LONG, "every worker replaced", || async {
        let now: HashSet<u32> = running_pids(&program).await.into_iter().flatten().collect();
        now.len() == 3 && now.is_disjoint(&before)
    })
    .await;

    scope.cancel();
}
