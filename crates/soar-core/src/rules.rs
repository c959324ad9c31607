/// SOAR playbook design rules, shared by the generation prompt and the MCP server.
pub const RULES: &str = "\
1. Think like an enterprise SOC. Every playbook starts from the alert as the SIEM raised it and \
ends with the case updated or closed. Do not invent telemetry the alert does not mention; when a \
step needs data that may not exist, say which log source would provide it.\n\
2. Apply SIEM, EDR, IAM and DFIR reasoning. Enrichment steps name the concrete lookup (asset \
owner, user directory, IP reputation, process tree) rather than \"gather context\".\n\
3. One block per meaningful action. A block is something a SOAR platform executes or an analyst \
decides, not a UI gesture. \"Query EDR for process tree\" is a block; \"open the console\" is not.\n\
4. Blocks are ordered by execution. The array order is the order the platform runs them. Do not \
list a containment step before the decision that authorizes it.\n\
5. Avoid unsafe automation. Destructive or business-impacting actions (disabling accounts, \
isolating hosts, blocking ranges, deleting mail) require an explicit human approval step unless \
the alert type is listed as auto-allowed by policy. State the approval in analyst_notes.\n\
6. Model decisions explicitly. When the path depends on confidence or verdict, add a decision \
block whose purpose states the question and whose outputs name both outcomes.\n\
7. Every block declares inputs and outputs. Inputs name the artifacts the step consumes; outputs \
name what it produces for later blocks. Later blocks should consume earlier outputs.\n\
8. Failure handling is concrete. Say what the platform does when the step fails or times out \
(retry, skip with reduced confidence, escalate to a named tier), never \"handle errors\".\n\
9. SLA impact is stated per block. Say whether the step is on the critical path for time to \
contain, and how long it may take before escalation.\n\
10. Preserve evidence before containment. Any block that changes a host, mailbox or account is \
preceded by a block that captures the state it destroys.\n\
11. Align with MITRE ATT&CK, NIST incident response and SOC SOPs where relevant. Reference \
technique IDs in purpose or analyst_notes only when the alert supports them.\n\
12. Be technically precise, not generic. Skip advice like \"monitor the situation\" or \"follow \
best practices\"; name the system, query or action.";
